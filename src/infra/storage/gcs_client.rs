// =============================================================================
// GCS CLIENT - Google Cloud Storage JSON API
// =============================================================================
//
// Implements `ObjectStorage` on top of two endpoints:
//
// - List:     GET https://storage.googleapis.com/storage/v1/b/{bucket}/o
//             (paginated through `nextPageToken`)
// - Download: GET https://storage.googleapis.com/storage/v1/b/{bucket}/o/{object}?alt=media
//
// Authentication is a Bearer token from the session's service-account key.
// Emulators (fake-gcs-server and friends) accept anonymous requests, so an
// emulator client skips the token exchange entirely.
// Object names may contain `/`; each name is encoded as ONE path segment.

use crate::core::storage::{DownloadedObject, ObjectStorage, StorageCredentials, StorageError};
use crate::infra::google_auth::{ServiceAccountAuth, STORAGE_READ_ONLY_SCOPE};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{header, Client, Response, Url};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

const STORAGE_API_BASE: &str = "https://storage.googleapis.com/storage/v1";

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Http(err.to_string())
    }
}

/// One page of `objects.list`. Only the fields we ask for are present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectsPage {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
}

/// Error body returned by the JSON API.
#[derive(Debug, Deserialize)]
struct GcsErrorResponse {
    error: GcsErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GcsErrorDetail {
    message: String,
}

/// Client for reading buckets with per-session service-account keys.
pub struct GcsClient {
    client: Client,
    base_url: String,
    /// One authenticator per key file so the token cache survives between clicks.
    auths: DashMap<PathBuf, Arc<ServiceAccountAuth>>,
    anonymous: bool,
}

impl GcsClient {
    pub fn new() -> Self {
        Self::with_base_url(STORAGE_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            auths: DashMap::new(),
            anonymous: false,
        }
    }

    /// Client for a local storage emulator. Requests carry no credentials.
    pub fn for_emulator(base_url: impl Into<String>) -> Self {
        // Emulators run locally; never route them through a system proxy
        let client = Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            anonymous: true,
            ..Self::with_base_url(base_url)
        }
    }

    /// `{base}/b/{bucket}/o[/{object}]` with each part percent-encoded.
    fn objects_url(&self, bucket: &str, object: Option<&str>) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StorageError::Http(format!("invalid storage URL: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::Http("storage URL cannot be a base".to_string()))?;
            segments.pop_if_empty().extend(["b", bucket, "o"]);
            if let Some(object) = object {
                segments.push(object);
            }
        }
        Ok(url)
    }

    /// Bearer token for the session's key, or `None` against an emulator.
    async fn access_token(
        &self,
        credentials: &StorageCredentials,
    ) -> Result<Option<String>, StorageError> {
        if self.anonymous {
            return Ok(None);
        }

        let key_path = credentials.key_path_buf();

        let cached = self.auths.get(&key_path).map(|entry| Arc::clone(entry.value()));

        let auth = match cached {
            Some(auth) => auth,
            None => {
                let auth = Arc::new(
                    ServiceAccountAuth::from_file(
                        credentials.key_path(),
                        STORAGE_READ_ONLY_SCOPE,
                        self.client.clone(),
                    )
                    .await?,
                );
                tracing::debug!("Authenticating to Cloud Storage as {}", auth.client_email());
                // Key files are unique per upload; entries for replaced keys are
                // dropped here so the map only holds files that still exist.
                self.auths.retain(|path, _| path.exists());
                self.auths.insert(key_path, Arc::clone(&auth));
                auth
            }
        };

        Ok(Some(auth.get_access_token().await?))
    }

    async fn get(&self, url: Url, token: Option<&str>) -> Result<Response, StorageError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        Self::check_status(response).await
    }

    /// URL of one `objects.list` page.
    fn list_url(&self, bucket: &str, page_token: Option<&str>) -> Result<Url, StorageError> {
        let mut url = self.objects_url(bucket, None)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("fields", "items(name),nextPageToken");
            if let Some(page_token) = page_token {
                query.append_pair("pageToken", page_token);
            }
        }
        Ok(url)
    }

    /// Turns a non-2xx response into `StorageError::Api` with Google's message.
    async fn check_status(response: Response) -> Result<Response, StorageError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Err(StorageError::Api {
            status,
            message: Self::error_message(&text),
        })
    }

    fn error_message(body: &str) -> String {
        match serde_json::from_str::<GcsErrorResponse>(body) {
            Ok(parsed) => parsed.error.message,
            Err(_) if body.trim().is_empty() => "no details returned".to_string(),
            Err(_) => body.trim().to_string(),
        }
    }

    fn parse_page(body: &str) -> Result<ObjectsPage, StorageError> {
        serde_json::from_str(body)
            .map_err(|e| StorageError::Http(format!("unexpected listing response: {}", e)))
    }
}

impl Default for GcsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStorage for GcsClient {
    async fn list_objects(
        &self,
        credentials: &StorageCredentials,
        bucket: &str,
    ) -> Result<Vec<String>, StorageError> {
        let token = self.access_token(credentials).await?;
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url(bucket, page_token.as_deref())?;
            let body = self.get(url, token.as_deref()).await?.text().await?;
            let page = Self::parse_page(&body)?;

            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        tracing::debug!(
            bucket,
            objects = names.len(),
            "Listed bucket as {}",
            credentials.client_email
        );
        Ok(names)
    }

    async fn download_object(
        &self,
        credentials: &StorageCredentials,
        bucket: &str,
        object: &str,
        destination: &Path,
    ) -> Result<DownloadedObject, StorageError> {
        let token = self.access_token(credentials).await?;

        let mut url = self.objects_url(bucket, Some(object))?;
        url.query_pairs_mut().append_pair("alt", "media");

        let mut response = self.get(url, token.as_deref()).await?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut file = tokio::fs::File::create(destination).await?;
        let mut bytes = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(bucket, object, bytes, "Downloaded object");
        Ok(DownloadedObject {
            bytes,
            content_type,
        })
    }
}
