// Session service: the form state behind the summarizer commands.
//
// Each method mirrors one widget of the form. The Discord layer calls these
// with primitives (user id, strings, numbers) and renders whatever comes back.

use super::session_models::SessionState;
use super::session_store::{SessionStore, StoreError};
use crate::core::storage::{StorageCredentials, StorageError};
use crate::core::summaries::SummaryStyle;
use std::path::PathBuf;

/// Discord caps autocomplete suggestions at 25 entries of 100 chars each.
const MAX_SUGGESTIONS: usize = 25;
const MAX_SUGGESTION_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Please enter an API key.")]
    MissingApiKey,
    #[error("Please enter a bucket name.")]
    MissingBucket,
    #[error("{0}")]
    Credentials(#[from] StorageError),
    #[error("List the files in a bucket before selecting one.")]
    NothingListed,
    #[error("'{0}' is not in the last listing of this bucket.")]
    UnknownFile(String),
}

/// What the user gets told after a successful credentials upload.
#[derive(Debug, Clone)]
pub struct CredentialsSummary {
    pub client_email: String,
    pub project_id: Option<String>,
}

pub struct SessionService<S: SessionStore> {
    store: S,
    work_dir: PathBuf,
}

impl<S: SessionStore> SessionService<S> {
    pub fn new(store: S, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            work_dir: work_dir.into(),
        }
    }

    pub async fn snapshot(&self, user_id: u64) -> Result<SessionState, SessionError> {
        Ok(self.store.load(user_id).await?)
    }

    pub async fn set_api_key(&self, user_id: u64, api_key: &str) -> Result<(), SessionError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SessionError::MissingApiKey);
        }

        let api_key = api_key.to_string();
        self.store
            .update(user_id, move |state| state.api_key = Some(api_key))
            .await?;

        tracing::info!(user_id, "Gemini API key updated");
        Ok(())
    }

    /// Validates an uploaded key file and keeps it for the session.
    /// Any previous key file is removed once the old credentials are dropped.
    pub async fn set_credentials(
        &self,
        user_id: u64,
        key_json: &[u8],
    ) -> Result<CredentialsSummary, SessionError> {
        let credentials = StorageCredentials::from_key_json(key_json, &self.work_dir)?;
        let summary = CredentialsSummary {
            client_email: credentials.client_email.clone(),
            project_id: credentials.project_id.clone(),
        };

        self.store
            .update(user_id, move |state| state.credentials = Some(credentials))
            .await?;

        tracing::info!(
            user_id,
            client_email = %summary.client_email,
            "Service account credentials stored"
        );
        Ok(summary)
    }

    /// Sets the bucket to list. A different bucket invalidates the listing.
    pub async fn set_bucket(&self, user_id: u64, bucket_name: &str) -> Result<(), SessionError> {
        let bucket_name = bucket_name.trim();
        if bucket_name.is_empty() {
            return Err(SessionError::MissingBucket);
        }

        let bucket_name = bucket_name.to_string();
        self.store
            .update(user_id, move |state| {
                if state.bucket_name != bucket_name {
                    state.bucket_name = bucket_name;
                    state.file_names.clear();
                    state.selected_file.clear();
                    state.show_summary_section = false;
                }
            })
            .await?;
        Ok(())
    }

    /// Stores the result of a listing. The selection section is only shown
    /// when the bucket had at least one object, and a selection that is no
    /// longer listed moves to the first object.
    pub async fn record_listing(
        &self,
        user_id: u64,
        file_names: Vec<String>,
    ) -> Result<SessionState, SessionError> {
        let state = self
            .store
            .update(user_id, move |state| {
                state.show_summary_section = !file_names.is_empty();
                if !file_names.contains(&state.selected_file) {
                    state.selected_file = file_names.first().cloned().unwrap_or_default();
                }
                state.file_names = file_names;
                state.clone()
            })
            .await?;
        Ok(state)
    }

    pub async fn select_file(&self, user_id: u64, file_name: &str) -> Result<(), SessionError> {
        let file_name = file_name.to_string();
        self.store
            .update(user_id, move |state| {
                if !state.show_summary_section || state.file_names.is_empty() {
                    return Err(SessionError::NothingListed);
                }
                if !state.file_names.contains(&file_name) {
                    return Err(SessionError::UnknownFile(file_name));
                }
                state.selected_file = file_name;
                Ok(())
            })
            .await?
    }

    /// Applies a summary-style choice.
    ///
    /// Lines and paragraphs clamp the count into their range and clear the
    /// custom prompt. Custom keeps the count and stores the prompt.
    pub async fn choose_style(
        &self,
        user_id: u64,
        style: SummaryStyle,
        count: Option<u8>,
        custom_prompt: Option<String>,
    ) -> Result<SessionState, SessionError> {
        let state = self
            .store
            .update(user_id, move |state| {
                state.summary_type = style;
                match style {
                    SummaryStyle::Lines | SummaryStyle::Paragraphs => {
                        let requested = count.unwrap_or(state.summary_value);
                        state.summary_value = style.clamp_count(requested);
                        state.custom_prompt.clear();
                    }
                    SummaryStyle::Custom => {
                        if let Some(prompt) = custom_prompt {
                            state.custom_prompt = prompt.trim().to_string();
                        }
                    }
                }
                state.clone()
            })
            .await?;
        Ok(state)
    }

    /// Listed object names containing `partial`, for autocomplete.
    pub async fn matching_files(
        &self,
        user_id: u64,
        partial: &str,
    ) -> Result<Vec<String>, SessionError> {
        let state = self.store.load(user_id).await?;
        let needle = partial.to_lowercase();

        Ok(state
            .file_names
            .into_iter()
            .filter(|name| name.len() <= MAX_SUGGESTION_LEN)
            .filter(|name| name.to_lowercase().contains(&needle))
            .take(MAX_SUGGESTIONS)
            .collect())
    }

    /// Forgets everything, including the key file.
    pub async fn reset(&self, user_id: u64) -> Result<bool, SessionError> {
        let existed = self.store.clear(user_id).await?;
        if existed {
            tracing::info!(user_id, "Session reset");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::storage_models::test_support::sample_key_json;
    use crate::infra::session::InMemorySessionStore;

    fn service(dir: &std::path::Path) -> SessionService<InMemorySessionStore> {
        SessionService::new(InMemorySessionStore::new(), dir)
    }

    #[tokio::test]
    async fn test_blank_inputs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        assert!(matches!(
            service.set_api_key(1, "   ").await,
            Err(SessionError::MissingApiKey)
        ));
        assert!(matches!(
            service.set_bucket(1, "").await,
            Err(SessionError::MissingBucket)
        ));
    }

    #[tokio::test]
    async fn test_credentials_replace_previous_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        service.set_credentials(1, &sample_key_json()).await.unwrap();
        let first = service
            .snapshot(1)
            .await
            .unwrap()
            .credentials
            .unwrap()
            .key_path_buf();

        service.set_credentials(1, &sample_key_json()).await.unwrap();
        let second = service
            .snapshot(1)
            .await
            .unwrap()
            .credentials
            .unwrap()
            .key_path_buf();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert!(second.exists());
    }

    #[tokio::test]
    async fn test_invalid_credentials_leave_session_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let err = service.set_credentials(1, b"{}").await.unwrap_err();
        assert!(matches!(err, SessionError::Credentials(_)));
        assert!(service.snapshot(1).await.unwrap().credentials.is_none());
    }

    #[tokio::test]
    async fn test_listing_controls_selection_section() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        service.set_bucket(1, "docs").await.unwrap();

        let state = service.record_listing(1, vec![]).await.unwrap();
        assert!(!state.show_summary_section);

        let state = service
            .record_listing(1, vec!["a.pdf".to_string(), "b.pdf".to_string()])
            .await
            .unwrap();
        assert!(state.show_summary_section);
        assert_eq!(state.file_names.len(), 2);
    }

    #[tokio::test]
    async fn test_select_file_requires_listing_membership() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        assert!(matches!(
            service.select_file(1, "a.pdf").await,
            Err(SessionError::NothingListed)
        ));

        service.set_bucket(1, "docs").await.unwrap();
        service
            .record_listing(1, vec!["a.pdf".to_string()])
            .await
            .unwrap();

        assert!(matches!(
            service.select_file(1, "missing.pdf").await,
            Err(SessionError::UnknownFile(_))
        ));

        service.select_file(1, "a.pdf").await.unwrap();
        assert_eq!(service.snapshot(1).await.unwrap().selected_file, "a.pdf");
    }

    #[tokio::test]
    async fn test_changing_bucket_clears_listing() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        service.set_bucket(1, "docs").await.unwrap();
        service
            .record_listing(1, vec!["a.pdf".to_string()])
            .await
            .unwrap();
        service.select_file(1, "a.pdf").await.unwrap();

        // Same bucket keeps everything
        service.set_bucket(1, " docs ").await.unwrap();
        assert_eq!(service.snapshot(1).await.unwrap().selected_file, "a.pdf");

        service.set_bucket(1, "other").await.unwrap();
        let state = service.snapshot(1).await.unwrap();
        assert!(state.file_names.is_empty());
        assert!(state.selected_file.is_empty());
        assert!(!state.show_summary_section);
    }

    #[tokio::test]
    async fn test_listing_selects_first_object() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        service.set_bucket(1, "docs").await.unwrap();

        let state = service
            .record_listing(1, vec!["a.pdf".to_string(), "b.pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(state.selected_file, "a.pdf");
    }

    #[tokio::test]
    async fn test_relisting_replaces_vanished_selection() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        service.set_bucket(1, "docs").await.unwrap();
        service
            .record_listing(1, vec!["a.pdf".to_string(), "b.pdf".to_string()])
            .await
            .unwrap();
        service.select_file(1, "b.pdf").await.unwrap();

        // Still listed: kept
        let state = service
            .record_listing(1, vec!["c.pdf".to_string(), "b.pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(state.selected_file, "b.pdf");

        // Gone: the first object takes its place
        let state = service
            .record_listing(1, vec!["c.pdf".to_string(), "d.pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(state.selected_file, "c.pdf");

        let state = service.record_listing(1, vec![]).await.unwrap();
        assert!(state.selected_file.is_empty());
        assert!(!state.show_summary_section);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commands_keep_each_change() {
        let dir = tempfile::tempdir().unwrap();
        let service = std::sync::Arc::new(service(dir.path()));

        let mut handles = Vec::new();
        for i in 0..50u8 {
            let service = std::sync::Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    service.set_api_key(1, "user-key").await.unwrap();
                } else {
                    service
                        .choose_style(1, SummaryStyle::Paragraphs, Some(2), None)
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let state = service.snapshot(1).await.unwrap();
        assert_eq!(state.api_key.as_deref(), Some("user-key"));
        assert_eq!(state.summary_type, SummaryStyle::Paragraphs);
        assert_eq!(state.summary_value, 2);
    }

    #[tokio::test]
    async fn test_choosing_lines_clears_custom_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        service
            .choose_style(1, SummaryStyle::Custom, None, Some("Who?".to_string()))
            .await
            .unwrap();
        let state = service
            .choose_style(1, SummaryStyle::Lines, Some(50), None)
            .await
            .unwrap();

        assert_eq!(state.summary_type, SummaryStyle::Lines);
        assert_eq!(state.summary_value, 20);
        assert!(state.custom_prompt.is_empty());
    }

    #[tokio::test]
    async fn test_paragraphs_clamp_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        service
            .choose_style(1, SummaryStyle::Lines, Some(12), None)
            .await
            .unwrap();
        let state = service
            .choose_style(1, SummaryStyle::Paragraphs, None, None)
            .await
            .unwrap();

        assert_eq!(state.summary_value, 5);
    }

    #[tokio::test]
    async fn test_custom_keeps_value_and_stores_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        service
            .choose_style(1, SummaryStyle::Lines, Some(7), None)
            .await
            .unwrap();
        let state = service
            .choose_style(
                1,
                SummaryStyle::Custom,
                Some(1),
                Some("  List the authors. ".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(state.summary_value, 7);
        assert_eq!(state.custom_prompt, "List the authors.");
    }

    #[tokio::test]
    async fn test_matching_files_filters_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        service.set_bucket(1, "docs").await.unwrap();

        let mut names: Vec<String> = (0..40).map(|i| format!("report-{}.pdf", i)).collect();
        names.push("Notes.txt".to_string());
        names.push(format!("{}.pdf", "x".repeat(120)));
        service.record_listing(1, names).await.unwrap();

        assert_eq!(service.matching_files(1, "").await.unwrap().len(), 25);
        assert_eq!(
            service.matching_files(1, "notes").await.unwrap(),
            vec!["Notes.txt".to_string()]
        );
        assert!(service.matching_files(1, "xxx").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_removes_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        service.set_credentials(1, &sample_key_json()).await.unwrap();
        let path = service
            .snapshot(1)
            .await
            .unwrap()
            .credentials
            .unwrap()
            .key_path_buf();

        assert!(service.reset(1).await.unwrap());
        assert!(!path.exists());
        assert!(!service.reset(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        service.set_bucket(1, "alpha").await.unwrap();
        service.set_bucket(2, "beta").await.unwrap();

        assert_eq!(service.snapshot(1).await.unwrap().bucket_name, "alpha");
        assert_eq!(service.snapshot(2).await.unwrap().bucket_name, "beta");
    }
}
