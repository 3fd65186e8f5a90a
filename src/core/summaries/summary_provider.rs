use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Gemini API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("File processing failed: {0}")]
    FileProcessing(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A hosted model that can read a local file and answer a prompt about it.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    /// Uploads `file` and asks the model `prompt` about it.
    ///
    /// Returns `None` when the model produced no text.
    async fn summarize_file(
        &self,
        api_key: &str,
        file: &Path,
        mime_type: &str,
        prompt: &str,
    ) -> Result<Option<String>, ProviderError>;
}
