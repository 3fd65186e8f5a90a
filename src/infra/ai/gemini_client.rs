// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// This module provides an implementation of the `SummaryProvider` trait that
// communicates with Google's Gemini API (https://ai.google.dev/gemini-api/docs).
//
// **Flow for one summary:**
// 1. Upload the local file to the Files API (raw upload, bytes as body).
// 2. If the file is still `PROCESSING`, poll it until it becomes `ACTIVE`.
// 3. Call `generateContent` with two parts: the prompt text and a
//    `fileData` reference to the uploaded file.
// 4. Concatenate the text parts of the first candidate.
//
// **Authentication:** the user's API key travels in the `x-goog-api-key`
// header. It is never put into the URL and never logged.
//
// Uploaded files expire on Google's side after 48 hours; we don't delete them.

use crate::core::summaries::{ProviderError, SummaryProvider};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Default model used when `GEMINI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

// =============================================================================
// FILES API DATA STRUCTURES
// =============================================================================
//
// See: https://ai.google.dev/api/files

/// Metadata for a file stored by the Files API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    /// Resource name, e.g. `files/abc-123`.
    name: String,

    /// URI to reference the file from `generateContent`.
    uri: String,

    mime_type: String,

    /// `PROCESSING`, `ACTIVE` or `FAILED`.
    #[serde(default)]
    state: Option<String>,

    #[serde(default)]
    error: Option<GeminiStatus>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiStatus {
    #[serde(default)]
    message: String,
}

/// Response of the upload endpoint.
#[derive(Debug, Deserialize)]
struct UploadFileResponse {
    file: GeminiFile,
}

// =============================================================================
// GENERATE CONTENT DATA STRUCTURES
// =============================================================================
//
// See: https://ai.google.dev/api/generate-content

/// A single part of content. Requests use `text` or `file_data`; responses
/// carry `text` (plus fields we ignore).
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,

    /// Set on parts that are the model's thinking rather than its answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

/// Reference to a file uploaded through the Files API.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    /// "user" or "model". Absent on some blocked responses.
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,

    /// Why the model stopped generating (e.g., "STOP", "SAFETY").
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

/// Error response from the Gemini API.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

/// Client for summarizing files with Google's Gemini API.
///
/// # Example
/// ```ignore
/// let client = GeminiClient::new("gemini-1.5-flash".to_string());
/// let text = client
///     .summarize_file(&api_key, Path::new("report.pdf"), "application/pdf", "Summarize this.")
///     .await?;
/// ```
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl GeminiClient {
    pub fn new(model: String) -> Self {
        Self {
            client: Client::new(),
            base_url: API_BASE.to_string(),
            model,
            poll_interval: Duration::from_secs(2),
            max_polls: 30,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/v1beta/files", self.base_url)
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name)
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Uploads the file's bytes with the raw upload protocol.
    async fn upload_file(
        &self,
        api_key: &str,
        file: &Path,
        mime_type: &str,
    ) -> Result<GeminiFile, ProviderError> {
        let bytes = tokio::fs::read(file).await?;
        let size = bytes.len();

        let response = self
            .client
            .post(self.upload_url())
            .header("x-goog-api-key", api_key)
            .header("X-Goog-Upload-Protocol", "raw")
            .header(header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?;

        let body = Self::read_success_body(response).await?;
        let uploaded: UploadFileResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("upload response: {}", e)))?;

        tracing::debug!(
            "Uploaded {} bytes to Gemini as {} ({})",
            size,
            uploaded.file.name,
            uploaded.file.mime_type
        );
        Ok(uploaded.file)
    }

    /// Polls the file until it leaves the `PROCESSING` state.
    async fn wait_until_active(
        &self,
        api_key: &str,
        mut file: GeminiFile,
    ) -> Result<GeminiFile, ProviderError> {
        let mut polls = 0;

        loop {
            match file.state.as_deref() {
                Some("PROCESSING") => {}
                Some("FAILED") => {
                    let reason = file
                        .error
                        .as_ref()
                        .map(|e| e.message.clone())
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "the file could not be processed".to_string());
                    return Err(ProviderError::FileProcessing(reason));
                }
                // ACTIVE, or a state we don't know about: let generateContent decide.
                _ => return Ok(file),
            }

            if polls >= self.max_polls {
                return Err(ProviderError::FileProcessing(format!(
                    "{} still processing after {} checks",
                    file.name, polls
                )));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(self.file_url(&file.name))
                .header("x-goog-api-key", api_key)
                .send()
                .await?;
            let body = Self::read_success_body(response).await?;
            file = serde_json::from_str(&body)
                .map_err(|e| ProviderError::Decode(format!("file metadata: {}", e)))?;
        }
    }

    /// Builds the request: prompt first, then the file reference.
    fn build_request(prompt: &str, file: &GeminiFile) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part {
                        text: Some(prompt.to_string()),
                        ..Default::default()
                    },
                    Part {
                        file_data: Some(FileData {
                            mime_type: file.mime_type.clone(),
                            file_uri: file.uri.clone(),
                        }),
                        ..Default::default()
                    },
                ],
            }],
        }
    }

    /// Joins the answer text of the first candidate, skipping thought parts.
    fn extract_text(response: GenerateContentResponse) -> Option<String> {
        let candidate = response.candidates?.into_iter().next()?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason != "STOP" {
                tracing::warn!("Gemini finished with reason {}", reason);
            }
        }

        let text: String = candidate
            .content?
            .parts
            .into_iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Returns the body of a 2xx response, or the API's error message.
    async fn read_success_body(response: Response) -> Result<String, ProviderError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        // Try to parse as Gemini error response for better error messages
        let message = match serde_json::from_str::<GeminiErrorResponse>(&body) {
            Ok(parsed) => parsed.error.message,
            Err(_) => body,
        };
        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SummaryProvider for GeminiClient {
    async fn summarize_file(
        &self,
        api_key: &str,
        file: &Path,
        mime_type: &str,
        prompt: &str,
    ) -> Result<Option<String>, ProviderError> {
        let uploaded = self.upload_file(api_key, file, mime_type).await?;
        let ready = self.wait_until_active(api_key, uploaded).await?;

        let request = Self::build_request(prompt, &ready);

        tracing::debug!(
            "Gemini request to model {}: file {}, prompt {} chars",
            self.model,
            ready.name,
            prompt.len()
        );

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let body = Self::read_success_body(response).await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("generateContent response: {}", e)))?;

        let text = Self::extract_text(parsed);
        tracing::debug!(
            "Gemini response received: {} chars",
            text.as_ref().map(|t| t.len()).unwrap_or(0)
        );

        Ok(text)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::test_http::serve;

    fn local_client(base_url: String, max_polls: u32) -> GeminiClient {
        GeminiClient {
            client: Client::builder().no_proxy().build().unwrap(),
            base_url,
            model: DEFAULT_MODEL.to_string(),
            poll_interval: Duration::from_millis(5),
            max_polls,
        }
    }

    fn processing_file() -> GeminiFile {
        let mut file = active_file();
        file.state = Some("PROCESSING".to_string());
        file
    }

    fn active_file() -> GeminiFile {
        serde_json::from_str(
            r#"{
                "name": "files/abc-123",
                "displayName": "report.pdf",
                "mimeType": "application/pdf",
                "sizeBytes": "2048",
                "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc-123",
                "state": "ACTIVE"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_upload_response_parsing() {
        let parsed: UploadFileResponse = serde_json::from_str(
            r#"{"file": {"name": "files/x", "mimeType": "text/plain", "uri": "https://example.com/files/x", "state": "PROCESSING"}}"#,
        )
        .unwrap();

        assert_eq!(parsed.file.name, "files/x");
        assert_eq!(parsed.file.state.as_deref(), Some("PROCESSING"));
    }

    #[test]
    fn test_request_serialization() {
        let request = GeminiClient::build_request("Summarize in 3 lines.", &active_file());
        let json = serde_json::to_value(&request).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(parts[0]["text"], "Summarize in 3 lines.");
        assert_eq!(parts[1]["fileData"]["mimeType"], "application/pdf");
        assert_eq!(
            parts[1]["fileData"]["fileUri"],
            "https://generativelanguage.googleapis.com/v1beta/files/abc-123"
        );
        // Unused optional fields are skipped
        assert!(parts[0].get("fileData").is_none());
        assert!(parts[1].get("text").is_none());
        assert!(parts[0].get("thought").is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "First. "}, {"text": "Second."}]}, "finishReason": "STOP"}]}"#,
        )
        .unwrap();

        assert_eq!(
            GeminiClient::extract_text(response),
            Some("First. Second.".to_string())
        );
    }

    #[test]
    fn test_extract_text_skips_thoughts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "Let me think", "thought": true}, {"text": "Answer."}]}}]}"#,
        )
        .unwrap();

        assert_eq!(
            GeminiClient::extract_text(response),
            Some("Answer.".to_string())
        );
    }

    #[test]
    fn test_extract_text_handles_blocked_response() {
        let no_candidates: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert_eq!(GeminiClient::extract_text(no_candidates), None);

        let no_content: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert_eq!(GeminiClient::extract_text(no_content), None);
    }

    #[test]
    fn test_urls() {
        let client = GeminiClient::new("gemini-1.5-flash".to_string());
        assert_eq!(
            client.upload_url(),
            "https://generativelanguage.googleapis.com/upload/v1beta/files"
        );
        assert_eq!(
            client.file_url("files/abc"),
            "https://generativelanguage.googleapis.com/v1beta/files/abc"
        );
        assert_eq!(
            client.generate_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_failed_file_is_reported() {
        let client = GeminiClient::new(DEFAULT_MODEL.to_string());
        let mut file = active_file();
        file.state = Some("FAILED".to_string());
        file.error = Some(GeminiStatus {
            message: "Unsupported document".to_string(),
        });

        let err = client.wait_until_active("key", file).await.unwrap_err();
        assert!(matches!(err, ProviderError::FileProcessing(ref m) if m == "Unsupported document"));
    }

    #[tokio::test]
    async fn test_active_file_needs_no_polling() {
        let client = GeminiClient::new(DEFAULT_MODEL.to_string());
        let file = client.wait_until_active("key", active_file()).await.unwrap();
        assert_eq!(file.name, "files/abc-123");
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let client = GeminiClient::new(DEFAULT_MODEL.to_string());
        let err = client
            .upload_file("key", Path::new("/definitely/not/here.pdf"), "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Io(_)));
    }

    #[tokio::test]
    async fn test_processing_file_gives_up_after_max_polls() {
        // No polls allowed, so nothing is ever sent
        let client = local_client("http://127.0.0.1:9".to_string(), 0);

        let err = client
            .wait_until_active("key", processing_file())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::FileProcessing(ref m) if m.contains("still processing after 0 checks")
        ));
    }

    #[tokio::test]
    async fn test_processing_file_is_polled_until_active() {
        let server = serve(|target| {
            let body = if target == "/v1beta/files/abc-123" {
                r#"{"name": "files/abc-123", "mimeType": "application/pdf", "uri": "https://example.com/files/abc-123", "state": "ACTIVE"}"#
            } else {
                r#"{"error": {"message": "unexpected path"}}"#
            };
            (200, "application/json", body.to_string())
        })
        .await;
        let client = local_client(server.base_url.clone(), 3);

        let file = client
            .wait_until_active("secret-key", processing_file())
            .await
            .unwrap();

        assert_eq!(file.state.as_deref(), Some("ACTIVE"));
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].head.contains("x-goog-api-key: secret-key"));
        assert!(!requests[0].target.contains("secret-key"));
    }

    #[tokio::test]
    async fn test_polling_stops_when_limit_is_reached() {
        let server = serve(|_| {
            (
                200,
                "application/json",
                r#"{"name": "files/abc-123", "mimeType": "application/pdf", "uri": "https://example.com/files/abc-123", "state": "PROCESSING"}"#
                    .to_string(),
            )
        })
        .await;
        let client = local_client(server.base_url.clone(), 2);

        let err = client
            .wait_until_active("key", processing_file())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::FileProcessing(_)));
        assert_eq!(server.requests().len(), 2);
    }
}
