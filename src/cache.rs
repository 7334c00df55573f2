use chrono::{DateTime, Local, Utc};
use std::time::{Duration, Instant};

use crate::api::{ApiError, JobsApi};
use crate::filters::ServerKey;
use crate::models::Job;
use crate::status::StatusHook;

/// Last fetched job list plus what it was fetched for.
#[derive(Debug, Default)]
pub struct JobCache {
    jobs: Vec<Job>,
    key: Option<ServerKey>,
    fetched_at: Option<Instant>,
    updated_at: Option<DateTime<Local>>,
    invalidated: bool,
}

impl JobCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.updated_at
    }

    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// True when nothing was fetched yet, the list was invalidated, the
    /// server-side filter changed, or the refresh interval has elapsed.
    pub fn needs_fetch(&self, key: &ServerKey, refresh_every: Option<Duration>) -> bool {
        let Some(fetched_at) = self.fetched_at else {
            return true;
        };
        if self.invalidated || self.key.as_ref() != Some(key) {
            return true;
        }
        refresh_every.is_some_and(|every| fetched_at.elapsed() >= every)
    }

    pub fn store(&mut self, key: ServerKey, jobs: Vec<Job>) {
        self.jobs = jobs;
        self.key = Some(key);
        self.fetched_at = Some(Instant::now());
        self.updated_at = Some(Local::now());
        self.invalidated = false;
    }

    /// Fetch when [`needs_fetch`](Self::needs_fetch) says so. On failure the
    /// previous list stays in place. Returns whether a fetch happened.
    pub fn refresh<A: JobsApi + ?Sized>(
        &mut self,
        api: &A,
        key: &ServerKey,
        refresh_every: Option<Duration>,
    ) -> Result<bool, ApiError> {
        if !self.needs_fetch(key, refresh_every) {
            return Ok(false);
        }
        let query = key.to_list_query(Utc::now());
        match api.list_jobs(&query) {
            Ok(jobs) => {
                tracing::debug!(count = jobs.len(), "job list refreshed");
                self.store(key.clone(), jobs);
                Ok(true)
            }
            Err(e) => {
                // don't hammer a failing server on every tick
                self.fetched_at = Some(Instant::now());
                self.key = Some(key.clone());
                self.invalidated = false;
                Err(e)
            }
        }
    }
}

impl StatusHook for JobCache {
    fn after_status_change(&mut self, _updated: &Job) {
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{ListQuery, Period};
    use crate::models::fixtures::job;
    use crate::models::{JobDetail, JobStatus, RematchResponse};
    use std::cell::{Cell, RefCell};

    struct FakeApi {
        calls: Cell<usize>,
        last_query: RefCell<Option<ListQuery>>,
        fail: bool,
    }

    impl FakeApi {
        fn new(fail: bool) -> Self {
            Self {
                calls: Cell::new(0),
                last_query: RefCell::new(None),
                fail,
            }
        }
    }

    impl JobsApi for FakeApi {
        fn list_jobs(&self, query: &ListQuery) -> Result<Vec<Job>, ApiError> {
            self.calls.set(self.calls.get() + 1);
            *self.last_query.borrow_mut() = Some(query.clone());
            if self.fail {
                return Err(ApiError::Network("down".to_string()));
            }
            Ok(vec![job("1", JobStatus::New, None)])
        }

        fn job_detail(&self, _job_id: &str) -> Result<JobDetail, ApiError> {
            unreachable!()
        }

        fn update_status(&self, _job_id: &str, _status: JobStatus) -> Result<Job, ApiError> {
            unreachable!()
        }

        fn rematch(&self, _since: Option<&str>) -> Result<RematchResponse, ApiError> {
            unreachable!()
        }
    }

    #[test]
    fn test_fetches_once_until_invalidated() {
        let api = FakeApi::new(false);
        let mut cache = JobCache::new();
        let key = ServerKey::default();

        assert!(cache.refresh(&api, &key, None).unwrap());
        assert!(!cache.refresh(&api, &key, None).unwrap());
        assert_eq!(api.calls.get(), 1);
        assert_eq!(cache.jobs().len(), 1);
        assert!(cache.updated_at().is_some());

        cache.invalidate();
        assert!(cache.refresh(&api, &key, None).unwrap());
        assert_eq!(api.calls.get(), 2);
    }

    #[test]
    fn test_server_key_change_triggers_fetch() {
        let api = FakeApi::new(false);
        let mut cache = JobCache::new();
        cache.refresh(&api, &ServerKey::default(), None).unwrap();

        let key = ServerKey {
            period: Some(Period::Week),
            min_score: Some(50),
            ..Default::default()
        };
        assert!(cache.needs_fetch(&key, None));
        cache.refresh(&api, &key, None).unwrap();
        let query = api.last_query.borrow().clone().unwrap();
        assert_eq!(query.min_score, Some(50));
        assert!(query.after.is_some());
    }

    #[test]
    fn test_refresh_interval_elapsed() {
        let mut cache = JobCache::new();
        let key = ServerKey::default();
        cache.store(key.clone(), Vec::new());
        assert!(!cache.needs_fetch(&key, Some(Duration::from_secs(60))));
        assert!(cache.needs_fetch(&key, Some(Duration::ZERO)));
    }

    #[test]
    fn test_failed_fetch_keeps_previous_jobs() {
        let mut cache = JobCache::new();
        let key = ServerKey::default();
        cache.store(key.clone(), vec![job("1", JobStatus::New, None)]);
        cache.invalidate();

        let api = FakeApi::new(true);
        assert!(cache.refresh(&api, &key, None).is_err());
        assert_eq!(cache.jobs().len(), 1);
        assert!(!cache.needs_fetch(&key, None));
    }
}
