use crate::api::{ApiError, PreferencesApi};
use crate::models::{JobSource, Preferences};

/// Server copy plus the locally edited draft.
#[derive(Debug, Clone, Default)]
pub struct PreferencesDraft {
    saved: Preferences,
    pub draft: Preferences,
}

impl PreferencesDraft {
    pub fn new(saved: Preferences) -> Self {
        Self {
            draft: saved.clone(),
            saved,
        }
    }

    pub fn load<A: PreferencesApi + ?Sized>(api: &A) -> Result<Self, ApiError> {
        Ok(Self::new(api.preferences()?))
    }

    pub fn saved(&self) -> &Preferences {
        &self.saved
    }

    pub fn is_dirty(&self) -> bool {
        self.saved != self.draft
    }

    pub fn set_raw_input(&mut self, raw: &str) {
        let raw = raw.trim();
        self.draft.raw_input = (!raw.is_empty()).then(|| raw.to_string());
    }

    pub fn set_categories(&mut self, values: Vec<String>) {
        self.draft.categories = clean_tags(values);
    }

    pub fn set_keywords(&mut self, values: Vec<String>) {
        self.draft.keywords = clean_tags(values);
    }

    pub fn set_excluded_keywords(&mut self, values: Vec<String>) {
        self.draft.excluded_keywords = clean_tags(values);
    }

    pub fn set_seniority_levels(&mut self, values: Vec<String>) {
        self.draft.seniority_levels = clean_tags(values);
    }

    pub fn set_enabled_sources(&mut self, sources: Vec<JobSource>) {
        let mut unique = Vec::new();
        for source in sources {
            if !unique.contains(&source) {
                unique.push(source);
            }
        }
        self.draft.enabled_sources = unique;
    }

    /// Copy the structured fields of a normalize result into the draft.
    /// The raw input, sources, score threshold and notification toggle are
    /// not produced by normalization and stay as they are.
    pub fn apply_normalized(&mut self, normalized: &Preferences) {
        self.draft.categories = normalized.categories.clone();
        self.draft.seniority_levels = normalized.seniority_levels.clone();
        self.draft.keywords = normalized.keywords.clone();
        self.draft.excluded_keywords = normalized.excluded_keywords.clone();
        self.draft.remote_only = normalized.remote_only;
    }

    /// Ask the server to structure the draft's raw input. Blank input is
    /// not sent.
    pub fn normalize<A: PreferencesApi + ?Sized>(&mut self, api: &A) -> Result<Option<Preferences>, ApiError> {
        let Some(raw) = self
            .draft
            .raw_input
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
        else {
            return Ok(None);
        };
        let normalized = api.normalize_preferences(raw)?;
        self.apply_normalized(&normalized);
        Ok(Some(normalized))
    }

    /// Replace the server copy with the whole draft.
    pub fn save<A: PreferencesApi + ?Sized>(&mut self, api: &A) -> Result<&Preferences, ApiError> {
        let stored = api.save_preferences(&self.draft)?;
        tracing::info!("preferences saved");
        self.saved = stored.clone();
        self.draft = stored;
        Ok(&self.saved)
    }
}

/// Trim, lowercase and de-duplicate tag input, dropping blanks.
fn clean_tags(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let tag = value.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeApi {
        saved: RefCell<Option<Preferences>>,
        normalized_with: RefCell<Option<String>>,
    }

    impl PreferencesApi for FakeApi {
        fn preferences(&self) -> Result<Preferences, ApiError> {
            Ok(Preferences {
                raw_input: Some("senior rust, remote".to_string()),
                keywords: vec!["rust".to_string()],
                enabled_sources: vec![JobSource::Dou],
                min_score: Some(60),
                notifications_enabled: true,
                ..Default::default()
            })
        }

        fn save_preferences(&self, preferences: &Preferences) -> Result<Preferences, ApiError> {
            *self.saved.borrow_mut() = Some(preferences.clone());
            Ok(preferences.clone())
        }

        fn normalize_preferences(&self, raw_input: &str) -> Result<Preferences, ApiError> {
            *self.normalized_with.borrow_mut() = Some(raw_input.to_string());
            Ok(Preferences {
                raw_input: Some("ignored".to_string()),
                categories: vec!["rust".to_string()],
                seniority_levels: vec!["senior".to_string()],
                keywords: vec!["tokio".to_string(), "axum".to_string()],
                excluded_keywords: vec!["php".to_string()],
                remote_only: true,
                enabled_sources: vec![JobSource::Indeed],
                min_score: Some(10),
                notifications_enabled: false,
            })
        }
    }

    #[test]
    fn test_normalize_overwrites_structured_fields_only() {
        let api = FakeApi::default();
        let mut prefs = PreferencesDraft::load(&api).unwrap();
        let result = prefs.normalize(&api).unwrap();
        assert!(result.is_some());
        assert_eq!(api.normalized_with.borrow().as_deref(), Some("senior rust, remote"));

        let draft = &prefs.draft;
        assert_eq!(draft.raw_input.as_deref(), Some("senior rust, remote"));
        assert_eq!(draft.categories, vec!["rust"]);
        assert_eq!(draft.keywords, vec!["tokio", "axum"]);
        assert_eq!(draft.excluded_keywords, vec!["php"]);
        assert_eq!(draft.seniority_levels, vec!["senior"]);
        assert!(draft.remote_only);
        assert_eq!(draft.enabled_sources, vec![JobSource::Dou]);
        assert_eq!(draft.min_score, Some(60));
        assert!(draft.notifications_enabled);
        assert!(prefs.is_dirty());
    }

    #[test]
    fn test_blank_raw_input_is_not_normalized() {
        let api = FakeApi::default();
        let mut prefs = PreferencesDraft::load(&api).unwrap();
        prefs.set_raw_input("   ");
        assert_eq!(prefs.draft.raw_input, None);
        assert_eq!(prefs.normalize(&api).unwrap(), None);
        assert!(api.normalized_with.borrow().is_none());
    }

    #[test]
    fn test_save_sends_whole_draft() {
        let api = FakeApi::default();
        let mut prefs = PreferencesDraft::load(&api).unwrap();
        prefs.set_keywords(vec![" Rust ".to_string(), "rust".to_string(), "".to_string(), "Tokio".to_string()]);
        prefs.set_enabled_sources(vec![JobSource::Dou, JobSource::Djinni, JobSource::Dou]);
        assert!(prefs.is_dirty());

        prefs.save(&api).unwrap();
        let sent = api.saved.borrow().clone().unwrap();
        assert_eq!(sent.keywords, vec!["rust", "tokio"]);
        assert_eq!(sent.enabled_sources, vec![JobSource::Dou, JobSource::Djinni]);
        assert_eq!(sent.min_score, Some(60));
        assert_eq!(sent.raw_input.as_deref(), Some("senior rust, remote"));
        assert!(!prefs.is_dirty());
    }
}
