use crate::api::{ApiError, JobsApi};
use crate::models::{Job, JobStatus};

/// Runs after a status write has been accepted by the server.
pub trait StatusHook {
    fn after_status_change(&mut self, updated: &Job);
}

/// Writes a status change and feeds the result to the post-commit hooks.
///
/// Hooks run synchronously, in slice order, only after the write succeeded.
/// The dashboard passes the job cache first and review mode second.
/// Requests are neither retried nor deduplicated: whichever response is
/// applied last wins.
pub struct StatusCoordinator<'a, A: JobsApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: JobsApi + ?Sized> StatusCoordinator<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        hooks: &mut [&mut dyn StatusHook],
    ) -> Result<Job, ApiError> {
        let updated = self.api.update_status(job_id, status)?;
        for hook in hooks.iter_mut() {
            hook.after_status_change(&updated);
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::JobCache;
    use crate::filters::{ListQuery, ServerKey};
    use crate::models::{JobDetail, RematchResponse};
    use crate::models::fixtures::job;
    use crate::review::ReviewMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeApi {
        fail: bool,
    }

    impl JobsApi for FakeApi {
        fn list_jobs(&self, _query: &ListQuery) -> Result<Vec<Job>, ApiError> {
            Ok(Vec::new())
        }

        fn job_detail(&self, _job_id: &str) -> Result<JobDetail, ApiError> {
            unreachable!()
        }

        fn update_status(&self, job_id: &str, status: JobStatus) -> Result<Job, ApiError> {
            if self.fail {
                return Err(ApiError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            let id = job_id.trim_start_matches("ext-");
            Ok(job(id, status, None))
        }

        fn rematch(&self, _since: Option<&str>) -> Result<RematchResponse, ApiError> {
            unreachable!()
        }
    }

    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl StatusHook for Probe {
        fn after_status_change(&mut self, updated: &Job) {
            self.log
                .borrow_mut()
                .push(format!("{}:{}:{}", self.name, updated.id, updated.status));
        }
    }

    #[test]
    fn test_hooks_run_in_order_after_success() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut first = Probe { name: "cache", log: log.clone() };
        let mut second = Probe { name: "review", log: log.clone() };

        let api = FakeApi { fail: false };
        let updated = StatusCoordinator::new(&api)
            .set_status("ext-7", JobStatus::Applied, &mut [&mut first, &mut second])
            .unwrap();

        assert_eq!(updated.status, JobStatus::Applied);
        assert_eq!(*log.borrow(), vec!["cache:7:APPLIED", "review:7:APPLIED"]);
    }

    #[test]
    fn test_failure_skips_hooks() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut probe = Probe { name: "cache", log: log.clone() };

        let api = FakeApi { fail: true };
        let result = StatusCoordinator::new(&api).set_status("ext-7", JobStatus::Applied, &mut [&mut probe]);

        assert!(matches!(result, Err(ApiError::Status { status: 500, .. })));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_invalidates_cache_and_advances_review() {
        let jobs = vec![job("1", JobStatus::New, None), job("2", JobStatus::New, None)];
        let mut cache = JobCache::new();
        cache.store(ServerKey::default(), jobs.clone());
        let mut review = ReviewMode::new();
        review.enter(&jobs, &jobs[0]);

        let api = FakeApi { fail: false };
        StatusCoordinator::new(&api)
            .set_status("ext-1", JobStatus::Irrelevant, &mut [&mut cache, &mut review])
            .unwrap();

        assert!(cache.needs_fetch(&ServerKey::default(), None));
        assert_eq!(review.current_index(), 1);
        assert_eq!(review.total(), 2);
    }

    #[test]
    fn test_last_response_wins_for_same_job() {
        let jobs = vec![job("1", JobStatus::New, None), job("2", JobStatus::New, None)];
        let mut review = ReviewMode::new();
        review.enter(&jobs, &jobs[1]);

        let api = FakeApi { fail: false };
        let coordinator = StatusCoordinator::new(&api);
        coordinator
            .set_status("ext-2", JobStatus::Applied, &mut [&mut review])
            .unwrap();
        coordinator
            .set_status("ext-2", JobStatus::Irrelevant, &mut [&mut review])
            .unwrap();

        assert_eq!(review.current_job().map(|j| j.status), Some(JobStatus::Irrelevant));
    }

    #[test]
    fn test_inactive_review_is_left_alone() {
        let mut review = ReviewMode::new();
        let api = FakeApi { fail: false };
        StatusCoordinator::new(&api)
            .set_status("ext-3", JobStatus::Reviewed, &mut [&mut review])
            .unwrap();
        assert!(!review.is_active());
    }
}
