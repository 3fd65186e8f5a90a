// Summary service: the two actions of the summarizer.
//
// 1. `list_files` - ask object storage for every name in the bucket.
// 2. `generate_summary` - download the selected object into a scratch
//    directory, hand it to the model, delete the local copy.
//
// Both only validate the session and call through. There is no retry.

use super::summary_models::{build_prompt, guess_mime_type, local_file_name, SummaryResult};
use super::summary_provider::{ProviderError, SummaryProvider};
use crate::core::session::SessionState;
use crate::core::storage::{ObjectStorage, StorageCredentials, StorageError};
use crate::core::summaries::SummaryStyle;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Please enter a bucket name.")]
    MissingBucket,
    #[error("Please upload your Google Cloud JSON key file first.")]
    MissingCredentials,
    #[error("Please enter your Gemini API key first.")]
    MissingApiKey,
    #[error("Please select a file from the bucket first.")]
    NoFileSelected,
    #[error("Please enter a custom prompt or pick another summary type.")]
    MissingCustomPrompt,
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SummaryError {
    /// True when the user still has to fill something in, as opposed to a
    /// remote call failing.
    pub fn is_incomplete_input(&self) -> bool {
        matches!(
            self,
            SummaryError::MissingBucket
                | SummaryError::MissingCredentials
                | SummaryError::MissingApiKey
                | SummaryError::NoFileSelected
                | SummaryError::MissingCustomPrompt
        )
    }
}

/// Everything needed for one generation call, pulled out of a session.
#[derive(Debug)]
struct SummaryRequest<'a> {
    credentials: &'a StorageCredentials,
    bucket: &'a str,
    object_name: &'a str,
    api_key: &'a str,
    prompt: String,
}

pub struct SummaryService<S: ObjectStorage, P: SummaryProvider> {
    storage: S,
    provider: P,
    work_dir: PathBuf,
    default_api_key: Option<String>,
}

impl<S: ObjectStorage, P: SummaryProvider> SummaryService<S, P> {
    pub fn new(
        storage: S,
        provider: P,
        work_dir: impl Into<PathBuf>,
        default_api_key: Option<String>,
    ) -> Self {
        Self {
            storage,
            provider,
            work_dir: work_dir.into(),
            default_api_key: default_api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn has_default_api_key(&self) -> bool {
        self.default_api_key.is_some()
    }

    /// Lists every object name in the session's bucket.
    pub async fn list_files(&self, session: &SessionState) -> Result<Vec<String>, SummaryError> {
        let bucket = session.bucket_name.trim();
        if bucket.is_empty() {
            return Err(SummaryError::MissingBucket);
        }
        let credentials = session
            .credentials
            .as_ref()
            .ok_or(SummaryError::MissingCredentials)?;

        let names = self.storage.list_objects(credentials, bucket).await?;
        tracing::info!(bucket, objects = names.len(), "Listed bucket");
        Ok(names)
    }

    /// Checks that the session has everything `generate_summary` needs,
    /// without touching storage or the model.
    pub fn check_ready(&self, session: &SessionState) -> Result<(), SummaryError> {
        self.prepare(session).map(|_| ())
    }

    /// Downloads the selected object, asks the model for a summary and
    /// removes the local copy again, whatever the outcome.
    pub async fn generate_summary(
        &self,
        session: &SessionState,
    ) -> Result<SummaryResult, SummaryError> {
        let request = self.prepare(session)?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("download-")
            .tempdir_in(&self.work_dir)?;
        let local_path = scratch.path().join(local_file_name(request.object_name));

        let outcome = self.summarize_download(&request, &local_path).await;

        if let Err(e) = scratch.close() {
            tracing::warn!("Failed to remove temporary download {:?}: {}", local_path, e);
        }

        match &outcome {
            Ok(summary) => tracing::info!(
                bucket = request.bucket,
                object = request.object_name,
                chars = summary.text.len(),
                "Summary generated"
            ),
            Err(e) => tracing::warn!(
                bucket = request.bucket,
                object = request.object_name,
                "Summary generation failed: {}",
                e
            ),
        }

        outcome
    }

    fn prepare<'a>(&'a self, session: &'a SessionState) -> Result<SummaryRequest<'a>, SummaryError> {
        let bucket = session.bucket_name.trim();
        if bucket.is_empty() {
            return Err(SummaryError::MissingBucket);
        }
        let credentials = session
            .credentials
            .as_ref()
            .ok_or(SummaryError::MissingCredentials)?;
        if !session.show_summary_section || session.selected_file.is_empty() {
            return Err(SummaryError::NoFileSelected);
        }
        let api_key = session
            .effective_api_key(self.default_api_key.as_deref())
            .ok_or(SummaryError::MissingApiKey)?;
        if session.summary_type == SummaryStyle::Custom && session.custom_prompt.trim().is_empty()
        {
            return Err(SummaryError::MissingCustomPrompt);
        }

        Ok(SummaryRequest {
            credentials,
            bucket,
            object_name: &session.selected_file,
            api_key,
            prompt: build_prompt(
                session.summary_type,
                session.summary_value,
                &session.custom_prompt,
            ),
        })
    }

    async fn summarize_download(
        &self,
        request: &SummaryRequest<'_>,
        local_path: &Path,
    ) -> Result<SummaryResult, SummaryError> {
        let downloaded = self
            .storage
            .download_object(
                request.credentials,
                request.bucket,
                request.object_name,
                local_path,
            )
            .await?;

        let mime_type = guess_mime_type(request.object_name, downloaded.content_type.as_deref());
        tracing::debug!(
            object = request.object_name,
            bytes = downloaded.bytes,
            mime_type = %mime_type,
            "Downloaded object for summarization"
        );

        let text = self
            .provider
            .summarize_file(request.api_key, local_path, &mime_type, &request.prompt)
            .await?;

        Ok(SummaryResult::new(request.object_name, text))
    }
}
