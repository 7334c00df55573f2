use anyhow::{Context, Result, anyhow};

/// Open a job's original posting in the default web browser.
pub fn open_url(url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(anyhow!("Refusing to open non-web URL '{}'", url));
    }

    tracing::debug!(url, "opening original posting");
    webbrowser::open(url).with_context(|| format!("Failed to open '{}' in a browser", url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_web_urls() {
        assert!(open_url("").is_err());
        assert!(open_url("file:///etc/passwd").is_err());
        assert!(open_url("javascript:alert(1)").is_err());
        assert!(open_url("ftp://jobs.example.com/1").is_err());
    }
}
