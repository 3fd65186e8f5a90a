use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

use super::object_storage::StorageError;

/// Upper bound for an uploaded key file. Real service-account keys are ~2.3 KB.
pub const MAX_KEY_FILE_BYTES: usize = 64 * 1024;

/// The subset of a service-account key we check before accepting it.
#[derive(Debug, Deserialize)]
struct ServiceAccountKeyInfo {
    #[serde(rename = "type")]
    key_type: String,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    client_email: String,
    #[serde(default)]
    private_key: String,
    #[serde(default)]
    token_uri: String,
}

/// A validated service-account key, kept on disk while the session holds it.
///
/// The key file is a temporary file: it is removed when the last clone of
/// these credentials is dropped.
#[derive(Debug, Clone)]
pub struct StorageCredentials {
    pub client_email: String,
    pub project_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    key_file: Arc<TempPath>,
}

impl StorageCredentials {
    /// Validates `json` as a service-account key and writes it under `dir`.
    pub fn from_key_json(json: &[u8], dir: &Path) -> Result<Self, StorageError> {
        if json.len() > MAX_KEY_FILE_BYTES {
            return Err(StorageError::InvalidCredentials(format!(
                "key file is too large ({} bytes)",
                json.len()
            )));
        }

        let info: ServiceAccountKeyInfo = serde_json::from_slice(json)
            .map_err(|e| StorageError::InvalidCredentials(format!("not a JSON key file: {}", e)))?;

        if info.key_type != "service_account" {
            return Err(StorageError::InvalidCredentials(format!(
                "expected a service_account key, got '{}'",
                info.key_type
            )));
        }

        for (field, value) in [
            ("client_email", &info.client_email),
            ("private_key", &info.private_key),
            ("token_uri", &info.token_uri),
        ] {
            if value.trim().is_empty() {
                return Err(StorageError::InvalidCredentials(format!(
                    "missing '{}'",
                    field
                )));
            }
        }

        std::fs::create_dir_all(dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("credentials-")
            .suffix(".json")
            .tempfile_in(dir)?;
        file.write_all(json)?;
        file.flush()?;

        Ok(Self {
            client_email: info.client_email,
            project_id: info.project_id,
            uploaded_at: Utc::now(),
            key_file: Arc::new(file.into_temp_path()),
        })
    }

    /// Path of the key file on disk.
    pub fn key_path(&self) -> &Path {
        &self.key_file
    }

    pub fn key_path_buf(&self) -> PathBuf {
        self.key_file.to_path_buf()
    }
}

/// Metadata about an object that was written to local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedObject {
    pub bytes: u64,
    pub content_type: Option<String>,
}
