use crate::core::storage::StorageCredentials;
use crate::core::summaries::SummaryStyle;

/// Default count requested for line and paragraph summaries.
pub const DEFAULT_SUMMARY_VALUE: u8 = 3;

/// Everything one user has entered into the summarizer so far.
///
/// Nothing here outlives the process. Dropping the state also drops the
/// credentials, which removes the key file from disk.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub api_key: Option<String>,
    pub credentials: Option<StorageCredentials>,
    pub bucket_name: String,
    pub file_names: Vec<String>,
    pub selected_file: String,
    pub summary_type: SummaryStyle,
    pub summary_value: u8,
    pub custom_prompt: String,
    pub show_summary_section: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            api_key: None,
            credentials: None,
            bucket_name: String::new(),
            file_names: Vec::new(),
            selected_file: String::new(),
            summary_type: SummaryStyle::Lines,
            summary_value: DEFAULT_SUMMARY_VALUE,
            custom_prompt: String::new(),
            show_summary_section: false,
        }
    }
}

impl SessionState {
    /// Listing needs credentials and a bucket name.
    pub fn can_list(&self) -> bool {
        self.credentials.is_some() && !self.bucket_name.trim().is_empty()
    }

    /// The session's own key, falling back to `default_key`.
    pub fn effective_api_key<'a>(&'a self, default_key: Option<&'a str>) -> Option<&'a str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .or(default_key.filter(|k| !k.trim().is_empty()))
    }

    /// Generation needs a selected file, an API key and, for custom
    /// summaries, a prompt.
    pub fn can_generate(&self, default_key: Option<&str>) -> bool {
        self.show_summary_section
            && !self.selected_file.is_empty()
            && self.effective_api_key(default_key).is_some()
            && (self.summary_type != SummaryStyle::Custom || !self.custom_prompt.trim().is_empty())
    }
}
