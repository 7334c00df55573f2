use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Url;
use std::fmt;
use std::str::FromStr;

use crate::models::{JobSource, JobStatus};

const QUERY_BASE: &str = "hunter://jobs";

/// Time window applied to one of the job timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Day,
    ThreeDays,
    Week,
    Month,
}

impl Period {
    pub const ALL: [Period; 4] = [Self::Day, Self::ThreeDays, Self::Week, Self::Month];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::ThreeDays => "3d",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::ThreeDays => "3d",
            Self::Week => "Week",
            Self::Month => "Month",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Day => Duration::hours(24),
            Self::ThreeDays => Duration::days(3),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }

    /// None -> 24h -> 3d -> 7d -> 30d -> None
    pub fn cycle(current: Option<Period>) -> Option<Period> {
        match current {
            None => Some(Self::Day),
            Some(Self::Day) => Some(Self::ThreeDays),
            Some(Self::ThreeDays) => Some(Self::Week),
            Some(Self::Week) => Some(Self::Month),
            Some(Self::Month) => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| format!("unknown period '{}' (expected 24h, 3d, 7d or 30d)", s))
    }
}

/// Which job timestamp a [`Period`] is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PeriodField {
    #[default]
    Matched,
    Published,
    Updated,
}

impl PeriodField {
    pub const ALL: [PeriodField; 3] = [Self::Matched, Self::Published, Self::Updated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Published => "published",
            Self::Updated => "updated",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched => "Matched",
            Self::Published => "Published",
            Self::Updated => "Scraped",
        }
    }

    /// Name of the `GET /jobs` parameter carrying the cutoff for this field.
    pub fn api_param(&self) -> &'static str {
        match self {
            Self::Matched => "matchedAfter",
            Self::Published => "publishedAfter",
            Self::Updated => "updatedAfter",
        }
    }

    pub fn next(&self) -> PeriodField {
        match self {
            Self::Matched => Self::Published,
            Self::Published => Self::Updated,
            Self::Updated => Self::Matched,
        }
    }
}

impl FromStr for PeriodField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown period field '{}'", s))
    }
}

/// The shareable view state. Empty or absent fields place no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub statuses: Vec<JobStatus>,
    pub sources: Vec<JobSource>,
    pub search: Option<String>,
    pub remote: bool,
    pub min_score: Option<u8>,
    pub period: Option<Period>,
    pub period_field: PeriodField,
}

impl JobFilter {
    /// Encode as a URL query string, omitting empty and default fields.
    pub fn to_query(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if !self.sources.is_empty() {
            pairs.push(("sources", join(self.sources.iter().map(JobSource::as_str))));
        }
        if !self.statuses.is_empty() {
            pairs.push(("statuses", join(self.statuses.iter().map(JobStatus::as_str))));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if self.remote {
            pairs.push(("remote", "true".to_string()));
        }
        if let Some(score) = self.min_score {
            pairs.push(("minScore", score.to_string()));
        }
        if let Some(period) = self.period {
            pairs.push(("period", period.as_str().to_string()));
        }
        if self.period_field != PeriodField::default() {
            pairs.push(("periodField", self.period_field.as_str().to_string()));
        }

        if pairs.is_empty() {
            return String::new();
        }

        let Ok(mut url) = Url::parse(QUERY_BASE) else {
            return String::new();
        };
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
        }
        url.query().unwrap_or_default().to_string()
    }

    /// Decode a query string. Anything unknown or unparseable is dropped.
    pub fn from_query(query: &str) -> Self {
        let mut filter = JobFilter::default();
        let query = query.trim().trim_start_matches('?');
        let Ok(url) = Url::parse(&format!("{}?{}", QUERY_BASE, query)) else {
            return filter;
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "sources" => filter.sources = parse_list(&value),
                "statuses" => filter.statuses = parse_list(&value),
                "search" if !value.is_empty() => filter.search = Some(value.into_owned()),
                "remote" => filter.remote = value == "true",
                "minScore" => filter.min_score = value.trim().parse().ok(),
                "period" => filter.period = value.parse().ok(),
                "periodField" => filter.period_field = value.parse().unwrap_or_default(),
                _ => {}
            }
        }

        filter
    }

    /// The part of the filter the server applies; changes to it require a refetch.
    pub fn server_key(&self) -> ServerKey {
        ServerKey {
            min_score: self.min_score,
            sources: self.sources.clone(),
            period: self.period,
            period_field: self.period_field,
        }
    }

    pub fn toggle_status(&mut self, status: JobStatus) {
        if let Some(pos) = self.statuses.iter().position(|s| *s == status) {
            self.statuses.remove(pos);
        } else {
            self.statuses.push(status);
        }
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.statuses.is_empty() {
            parts.push(format!(
                "status: {}",
                self.statuses.iter().map(|s| s.label()).collect::<Vec<_>>().join("/")
            ));
        }
        if !self.sources.is_empty() {
            parts.push(format!("source: {}", join(self.sources.iter().map(JobSource::as_str))));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("search: \"{}\"", search));
        }
        if self.remote {
            parts.push("remote only".to_string());
        }
        if let Some(score) = self.min_score {
            parts.push(format!("score >= {}", score));
        }
        match self.period {
            Some(period) => parts.push(format!("{}: {}", self.period_field.label(), period.label())),
            None => parts.push("all time".to_string()),
        }
        parts.join("  |  ")
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(",")
}

fn parse_list<T: FromStr>(value: &str) -> Vec<T> {
    value.split(',').filter_map(|item| item.parse().ok()).collect()
}

/// Server-side filter dimensions, used as the job cache key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerKey {
    pub min_score: Option<u8>,
    pub sources: Vec<JobSource>,
    pub period: Option<Period>,
    pub period_field: PeriodField,
}

impl ServerKey {
    pub fn to_list_query(&self, now: DateTime<Utc>) -> ListQuery {
        ListQuery {
            min_score: self.min_score,
            sources: self.sources.clone(),
            after: self
                .period
                .map(|period| (self.period_field, period.cutoff(now))),
        }
    }
}

/// Parameters of `GET /jobs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub min_score: Option<u8>,
    pub sources: Vec<JobSource>,
    pub after: Option<(PeriodField, DateTime<Utc>)>,
}

impl ListQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(score) = self.min_score {
            params.push(("minScore", score.to_string()));
        }
        if !self.sources.is_empty() {
            params.push(("sources", join(self.sources.iter().map(JobSource::as_str))));
        }
        if let Some((field, instant)) = self.after {
            params.push((field.api_param(), to_iso(instant)));
        }
        params
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub fn to_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Holds the current filter. `set` replaces the whole value.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    current: JobFilter,
}

impl FilterState {
    pub fn new(filter: JobFilter) -> Self {
        Self { current: filter }
    }

    pub fn from_query(query: &str) -> Self {
        Self::new(JobFilter::from_query(query))
    }

    pub fn get(&self) -> &JobFilter {
        &self.current
    }

    pub fn set(&mut self, filter: JobFilter) {
        self.current = filter;
    }

    pub fn share_query(&self) -> String {
        self.current.to_query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn full_filter() -> JobFilter {
        JobFilter {
            statuses: vec![JobStatus::New, JobStatus::Applied],
            sources: vec![JobSource::Dou, JobSource::Linkedin],
            search: Some("rust dev".to_string()),
            remote: true,
            min_score: Some(70),
            period: Some(Period::Week),
            period_field: PeriodField::Published,
        }
    }

    #[test]
    fn test_empty_filter_encodes_to_empty_query() {
        assert_eq!(JobFilter::default().to_query(), "");
        assert_eq!(JobFilter::from_query(""), JobFilter::default());
    }

    #[test]
    fn test_query_round_trip() {
        let filter = full_filter();
        let query = filter.to_query();
        assert_eq!(JobFilter::from_query(&query), filter);
    }

    #[test]
    fn test_default_and_false_fields_are_omitted() {
        let filter = JobFilter {
            search: Some(String::new()),
            remote: false,
            period_field: PeriodField::Matched,
            period: Some(Period::Day),
            ..Default::default()
        };
        assert_eq!(filter.to_query(), "period=24h");
    }

    #[test]
    fn test_list_fields_are_comma_joined() {
        let filter = JobFilter {
            statuses: vec![JobStatus::New, JobStatus::Reviewed],
            ..Default::default()
        };
        let query = filter.to_query();
        assert!(query.starts_with("statuses=NEW"));
        assert!(query.contains("REVIEWED"));
    }

    #[test]
    fn test_unknown_values_are_dropped() {
        let filter = JobFilter::from_query(
            "?statuses=NEW,CLOSED&sources=MONSTER&minScore=abc&period=1y&periodField=posted&remote=yes&foo=bar",
        );
        assert_eq!(filter.statuses, vec![JobStatus::New]);
        assert!(filter.sources.is_empty());
        assert_eq!(filter.min_score, None);
        assert_eq!(filter.period, None);
        assert_eq!(filter.period_field, PeriodField::Matched);
        assert!(!filter.remote);
    }

    #[test]
    fn test_filter_state_set_replaces_whole_filter() {
        let mut state = FilterState::new(full_filter());
        state.set(JobFilter {
            remote: true,
            ..Default::default()
        });
        assert_eq!(state.get().statuses, Vec::<JobStatus>::new());
        assert!(state.get().remote);
        assert_eq!(state.share_query(), "remote=true");
    }

    #[test]
    fn test_list_query_params() {
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap();
        let query = full_filter().server_key().to_list_query(now);
        let params = query.to_params();
        assert!(params.contains(&("minScore", "70".to_string())));
        assert!(params.contains(&("sources", "DOU,LINKEDIN".to_string())));
        assert!(params.contains(&("publishedAfter", "2024-01-01T12:00:00.000Z".to_string())));
        // statuses are applied locally and never reach the server
        assert_eq!(params.len(), 3);
        assert!(!params.iter().any(|(k, _)| k.starts_with("status")));
    }

    #[test]
    fn test_server_key_ignores_local_only_fields() {
        let a = full_filter();
        let mut b = full_filter();
        b.search = None;
        b.statuses.clear();
        b.remote = false;
        assert_eq!(a.server_key(), b.server_key());
    }

    #[test]
    fn test_toggle_status() {
        let mut filter = JobFilter::default();
        filter.toggle_status(JobStatus::Applied);
        assert_eq!(filter.statuses, vec![JobStatus::Applied]);
        filter.toggle_status(JobStatus::Applied);
        assert!(filter.statuses.is_empty());
    }

    #[test]
    fn test_period_cycle_visits_all_values() {
        let mut period = None;
        let mut seen = Vec::new();
        for _ in 0..5 {
            period = Period::cycle(period);
            seen.push(period);
        }
        assert_eq!(
            seen,
            vec![Some(Period::Day), Some(Period::ThreeDays), Some(Period::Week), Some(Period::Month), None]
        );
    }
}
