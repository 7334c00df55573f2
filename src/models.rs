use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobSource {
    #[serde(alias = "dou")]
    Dou,
    #[serde(alias = "djinni")]
    Djinni,
    #[serde(alias = "linkedin")]
    Linkedin,
    #[serde(alias = "indeed")]
    Indeed,
}

impl JobSource {
    pub const ALL: [JobSource; 4] = [Self::Dou, Self::Djinni, Self::Linkedin, Self::Indeed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dou => "DOU",
            Self::Djinni => "DJINNI",
            Self::Linkedin => "LINKEDIN",
            Self::Indeed => "INDEED",
        }
    }
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown source '{}'", s))
    }
}

/// The user's personal verdict on a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    #[serde(alias = "new")]
    New,
    #[serde(alias = "unseen")]
    Unseen,
    #[serde(alias = "reviewed")]
    Reviewed,
    #[serde(alias = "applied")]
    Applied,
    #[serde(alias = "irrelevant")]
    Irrelevant,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        Self::New,
        Self::Unseen,
        Self::Reviewed,
        Self::Applied,
        Self::Irrelevant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Unseen => "UNSEEN",
            Self::Reviewed => "REVIEWED",
            Self::Applied => "APPLIED",
            Self::Irrelevant => "IRRELEVANT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Unseen => "Unseen",
            Self::Reviewed => "Reviewed",
            Self::Applied => "Applied",
            Self::Irrelevant => "Irrelevant",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub job_id: String,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub url: String,
    pub source: JobSource,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub remote: bool,
    pub status: JobStatus,
    #[serde(default)]
    pub score: Option<u8>, // 0-100, absent until the matcher has run
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub matched_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Job {
    /// Date used for list ordering: published, else matched, else empty.
    pub fn effective_date(&self) -> &str {
        self.published_at
            .as_deref()
            .or(self.matched_at.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    #[serde(default)]
    pub description: Option<String>, // HTML
    #[serde(default)]
    pub ai_reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub raw_input: Option<String>,
    pub categories: Vec<String>,
    pub seniority_levels: Vec<String>,
    pub keywords: Vec<String>,
    pub excluded_keywords: Vec<String>,
    pub remote_only: bool,
    pub enabled_sources: Vec<JobSource>,
    pub min_score: Option<u8>,
    pub notifications_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RematchResponse {
    pub jobs_queued: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeRequest {
    pub raw_input: String,
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn job(id: &str, status: JobStatus, published_at: Option<&str>) -> Job {
        Job {
            id: id.to_string(),
            job_id: format!("ext-{}", id),
            title: format!("Engineer {}", id),
            company: None,
            url: format!("https://jobs.example.com/{}", id),
            source: JobSource::Dou,
            salary: None,
            location: None,
            remote: false,
            status,
            score: None,
            published_at: published_at.map(str::to_string),
            matched_at: None,
            updated_at: None,
            created_at: None,
        }
    }
}
