use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::BTreeMap;

use crate::filters::{JobFilter, PeriodField};
use crate::models::{Job, JobStatus};

pub fn filter_jobs(jobs: &[Job], filter: &JobFilter) -> Vec<Job> {
    filter_jobs_at(jobs, filter, Utc::now())
}

/// Apply `filter` locally and sort newest first by effective date.
///
/// All constraints are AND-ed; list constraints match any member. A job
/// without a score never passes a minimum-score constraint, and a job whose
/// period timestamp is missing or unparseable never passes a period
/// constraint.
pub fn filter_jobs_at(jobs: &[Job], filter: &JobFilter, now: DateTime<Utc>) -> Vec<Job> {
    let search = filter
        .search
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let cutoff = filter.period.map(|period| period.cutoff(now));

    let mut out: Vec<Job> = jobs
        .iter()
        .filter(|job| filter.statuses.is_empty() || filter.statuses.contains(&job.status))
        .filter(|job| filter.sources.is_empty() || filter.sources.contains(&job.source))
        .filter(|job| !filter.remote || job.remote)
        .filter(|job| search.as_deref().is_none_or(|q| matches_search(job, q)))
        .filter(|job| {
            filter
                .min_score
                .is_none_or(|min| job.score.is_some_and(|score| score >= min))
        })
        .filter(|job| {
            cutoff.is_none_or(|cutoff| {
                period_timestamp(job, filter.period_field)
                    .and_then(parse_timestamp)
                    .is_some_and(|ts| ts >= cutoff)
            })
        })
        .cloned()
        .collect();

    // sort_by is stable, so equal dates keep their input order
    out.sort_by(|a, b| b.effective_date().cmp(a.effective_date()));
    out
}

fn matches_search(job: &Job, needle: &str) -> bool {
    let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(needle));
    hit(Some(job.title.as_str()))
        || hit(job.company.as_deref())
        || hit(job.location.as_deref())
        || hit(job.salary.as_deref())
}

fn period_timestamp(job: &Job, field: PeriodField) -> Option<&str> {
    match field {
        PeriodField::Matched => job.matched_at.as_deref(),
        PeriodField::Published => job.published_at.as_deref(),
        PeriodField::Updated => job.updated_at.as_deref(),
    }
}

/// Accepts RFC 3339, offset-less date-times (taken as UTC) and plain dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Count jobs per status. Statuses with no jobs are absent.
pub fn count_by_status(jobs: &[Job]) -> BTreeMap<JobStatus, usize> {
    let mut counts = BTreeMap::new();
    for job in jobs {
        *counts.entry(job.status).or_insert(0) += 1;
    }
    counts
}
