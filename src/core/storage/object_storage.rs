use super::storage_models::{DownloadedObject, StorageCredentials};
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Storage API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only access to an object-storage service.
///
/// Implementations talk to the real service; the core only needs names and
/// a way to get bytes onto local disk.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Returns the name of every object in `bucket`.
    async fn list_objects(
        &self,
        credentials: &StorageCredentials,
        bucket: &str,
    ) -> Result<Vec<String>, StorageError>;

    /// Writes the object's bytes to `destination`, replacing any existing file.
    async fn download_object(
        &self,
        credentials: &StorageCredentials,
        bucket: &str,
        object: &str,
        destination: &Path,
    ) -> Result<DownloadedObject, StorageError>;
}
