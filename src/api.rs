use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::filters::ListQuery;
use crate::models::{
    Job, JobDetail, JobStatus, NormalizeRequest, Preferences, RematchResponse, StatusUpdate,
};

pub const JOBS: &str = "/jobs";
pub const JOBS_REMATCH: &str = "/jobs/rematch";
pub const PREFERENCES: &str = "/preferences";
pub const PREFERENCES_NORMALIZE: &str = "/preferences/normalize";
pub const HEALTH: &str = "/actuator/health";

fn job_path(job_id: &str) -> String {
    format!("{}/{}", JOBS, job_id)
}

fn job_status_path(job_id: &str) -> String {
    format!("{}/{}/status", JOBS, job_id)
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// A user-facing title/detail pair for a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub detail: String,
}

impl ApiError {
    pub fn notice(&self) -> Notice {
        match self {
            ApiError::Network(message) => Notice {
                title: "Network Error".to_string(),
                detail: format!("Unable to reach the server: {}", message),
            },
            ApiError::Status { status, message } => {
                let title = match *status {
                    400 => "Bad Request".to_string(),
                    403 => "Access Denied".to_string(),
                    404 => "Not Found".to_string(),
                    500..=599 => "Server Error".to_string(),
                    code => format!("Error {}", code),
                };
                Notice {
                    title,
                    detail: message.clone(),
                }
            }
            ApiError::Decode(message) => Notice {
                title: "Unexpected Response".to_string(),
                detail: message.clone(),
            },
        }
    }
}

/// Receives every failed request exactly once.
pub trait ErrorReporter {
    fn report(&self, notice: &Notice);
}

/// Reporter for one-shot CLI commands. The command's own error carries the
/// message to the user, so this only logs.
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, notice: &Notice) {
        tracing::debug!(title = %notice.title, detail = %notice.detail, "api request failed");
    }
}

/// The job operations the dashboard state depends on.
pub trait JobsApi {
    fn list_jobs(&self, query: &ListQuery) -> Result<Vec<Job>, ApiError>;
    fn job_detail(&self, job_id: &str) -> Result<JobDetail, ApiError>;
    fn update_status(&self, job_id: &str, status: JobStatus) -> Result<Job, ApiError>;
    /// Re-run matching for jobs newer than `since`, or for all jobs.
    fn rematch(&self, since: Option<&str>) -> Result<RematchResponse, ApiError>;
}

/// Matching preferences live on the server and are replaced wholesale.
pub trait PreferencesApi {
    fn preferences(&self) -> Result<Preferences, ApiError>;
    fn save_preferences(&self, preferences: &Preferences) -> Result<Preferences, ApiError>;
    fn normalize_preferences(&self, raw_input: &str) -> Result<Preferences, ApiError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    reporter: Box<dyn ErrorReporter>,
}

impl ApiClient {
    pub fn new(base_url: &str, reporter: Box<dyn ErrorReporter>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            reporter,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let result = execute(request);
        if let Err(e) = &result {
            self.reporter.report(&e.notice());
        }
        result
    }

    pub fn health(&self) -> Result<serde_json::Value, ApiError> {
        self.send(self.client.get(self.url(HEALTH)))
    }
}

impl JobsApi for ApiClient {
    fn list_jobs(&self, query: &ListQuery) -> Result<Vec<Job>, ApiError> {
        let params = query.to_params();
        tracing::debug!(?params, "fetching jobs");
        self.send(self.client.get(self.url(JOBS)).query(&params))
    }

    fn job_detail(&self, job_id: &str) -> Result<JobDetail, ApiError> {
        self.send(self.client.get(self.url(&job_path(job_id))))
    }

    fn update_status(&self, job_id: &str, status: JobStatus) -> Result<Job, ApiError> {
        tracing::info!(job_id, %status, "updating job status");
        let body = StatusUpdate { status };
        self.send(self.client.patch(self.url(&job_status_path(job_id))).json(&body))
    }

    fn rematch(&self, since: Option<&str>) -> Result<RematchResponse, ApiError> {
        let mut request = self.client.post(self.url(JOBS_REMATCH));
        if let Some(since) = since {
            request = request.query(&[("since", since)]);
        }
        tracing::info!(since = since.unwrap_or("-"), "triggering rematch");
        self.send(request)
    }
}

impl PreferencesApi for ApiClient {
    fn preferences(&self) -> Result<Preferences, ApiError> {
        self.send(self.client.get(self.url(PREFERENCES)))
    }

    fn save_preferences(&self, preferences: &Preferences) -> Result<Preferences, ApiError> {
        self.send(self.client.put(self.url(PREFERENCES)).json(preferences))
    }

    fn normalize_preferences(&self, raw_input: &str) -> Result<Preferences, ApiError> {
        let body = NormalizeRequest {
            raw_input: raw_input.to_string(),
        };
        self.send(self.client.post(self.url(PREFERENCES_NORMALIZE)).json(&body))
    }
}

fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = request
        .send()
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(status_error(status, &body));
    }

    let text = response
        .text()
        .map_err(|e| ApiError::Network(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn title(status: u16) -> String {
        ApiError::Status {
            status,
            message: "x".to_string(),
        }
        .notice()
        .title
    }

    #[test]
    fn test_notice_titles() {
        assert_eq!(ApiError::Network("refused".to_string()).notice().title, "Network Error");
        assert_eq!(title(400), "Bad Request");
        assert_eq!(title(403), "Access Denied");
        assert_eq!(title(404), "Not Found");
        assert_eq!(title(500), "Server Error");
        assert_eq!(title(503), "Server Error");
        assert_eq!(title(409), "Error 409");
        assert_eq!(title(401), "Error 401");
    }

    #[test]
    fn test_status_error_prefers_server_message() {
        let err = status_error(StatusCode::BAD_REQUEST, r#"{"message":"bad status value","code":"E1"}"#);
        let notice = err.notice();
        assert_eq!(notice.title, "Bad Request");
        assert_eq!(notice.detail, "bad status value");
    }

    #[test]
    fn test_status_error_falls_back_to_reason() {
        let err = status_error(StatusCode::NOT_FOUND, "<html>nope</html>");
        assert_eq!(err.notice().detail, "Not Found");
        let err = status_error(StatusCode::BAD_GATEWAY, r#"{"message":"  "}"#);
        assert_eq!(err.notice().detail, "Bad Gateway");
    }

    #[test]
    fn test_error_message_names_status_and_server_message() {
        let err = status_error(StatusCode::NOT_FOUND, r#"{"message":"job ext-9 not found"}"#);
        let text = err.to_string();
        assert!(text.contains("404"));
        assert!(text.contains("job ext-9 not found"));
    }

    #[test]
    fn test_paths() {
        assert_eq!(job_path("dou-1"), "/jobs/dou-1");
        assert_eq!(job_status_path("dou-1"), "/jobs/dou-1/status");
    }

    struct Recorder(Rc<RefCell<Vec<Notice>>>);

    impl ErrorReporter for Recorder {
        fn report(&self, notice: &Notice) {
            self.0.borrow_mut().push(notice.clone());
        }
    }

    #[test]
    fn test_unreachable_server_is_reported_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        // port 9 (discard) on localhost is closed in test environments
        let client = ApiClient::new("http://127.0.0.1:9/", Box::new(Recorder(seen.clone()))).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");

        let result = client.job_detail("x");
        assert!(matches!(result, Err(ApiError::Network(_))));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].title, "Network Error");
    }
}
