use std::env;

pub const API_URL_VAR: &str = "JOB_HUNTER_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8095";

/// Value baked in by the build environment, if any.
const BUILD_API_URL: Option<&str> = option_env!("JOB_HUNTER_API_URL");

/// Resolve the jobs API base URL.
///
/// Order: explicit flag, runtime environment, build-time environment,
/// default. Empty values and unreplaced `__PLACEHOLDER__` templates are
/// skipped.
pub fn resolve_api_url(flag: Option<&str>) -> String {
    let runtime = env::var(API_URL_VAR).ok();
    pick_api_url(flag, runtime.as_deref(), BUILD_API_URL)
}

fn pick_api_url(flag: Option<&str>, runtime: Option<&str>, build: Option<&str>) -> String {
    [flag, runtime, build]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| is_usable(value))
        .unwrap_or(DEFAULT_API_URL)
        .trim_end_matches('/')
        .to_string()
}

fn is_usable(value: &str) -> bool {
    !value.is_empty() && !value.starts_with("__")
}
