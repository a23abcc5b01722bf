//! Drive REST client
//!
//! Thin typed wrapper over the Drive v3 API, restricted to the
//! `appDataFolder` space: list by name, download by id, multipart create
//! and delete by id. Every non-success status becomes
//! [`RemoteError::Status`] carrying the provider's own message; nothing is
//! retried here.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dutyledger_cloud::client::DriveClient;
//! use dutyledger_core::domain::AccessToken;
//!
//! # async fn example() -> Result<(), dutyledger_core::ports::RemoteError> {
//! let client = DriveClient::new();
//! let token = AccessToken::new("access-token-here");
//! let page = client.list_page(&token, "dutyledger_sync_", 100, None).await?;
//! println!("{} versions on this page", page.files.len());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use dutyledger_core::{
    domain::{AccessToken, RemoteVersion},
    ports::RemoteError,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;

/// Base URL for Drive API v3 metadata and media requests
pub const DRIVE_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Drive API v3 uploads
pub const DRIVE_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// The app-private folder that only this OAuth client can see
pub const APP_DATA_FOLDER: &str = "appDataFolder";

const LIST_FIELDS: &str = "nextPageToken,files(id,name,modifiedTime,size)";
const FILE_FIELDS: &str = "id,name,modifiedTime,size";

// ============================================================================
// Drive API response types
// ============================================================================

/// One file resource as returned by `files.list` / `files.create`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    modified_time: Option<DateTime<Utc>>,
    /// int64 values are encoded as JSON strings by the Drive API
    size: Option<String>,
}

impl From<DriveFile> for RemoteVersion {
    fn from(file: DriveFile) -> Self {
        RemoteVersion {
            id: file.id,
            name: file.name,
            modified_time: file.modified_time,
            size_bytes: file.size.and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// Error body: `{"error": {"code": 404, "message": "File not found: x."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// One page of a version listing
#[derive(Debug, Clone)]
pub struct VersionPage {
    pub files: Vec<RemoteVersion>,
    pub next_page_token: Option<String>,
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for the Drive API
///
/// Holds no credentials: every call takes the access token explicitly so the
/// caller decides which session a request runs under.
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    api_base_url: String,
    upload_base_url: String,
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClient {
    /// Creates a client against the public Drive endpoints
    pub fn new() -> Self {
        Self::with_base_urls(DRIVE_API_BASE_URL, DRIVE_UPLOAD_BASE_URL)
    }

    /// Creates a client with custom base URLs (useful for testing)
    ///
    /// # Arguments
    /// * `api_base_url` - Base for metadata, media and delete requests
    /// * `upload_base_url` - Base for multipart uploads
    pub fn with_base_urls(
        api_base_url: impl Into<String>,
        upload_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            upload_base_url: upload_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Creates an authenticated request builder for a metadata/media path
    pub fn request(&self, method: Method, path: &str, token: &AccessToken) -> RequestBuilder {
        let url = format!("{}{}", self.api_base_url, path);
        self.client.request(method, url).bearer_auth(token.secret())
    }

    /// Lists one page of `appDataFolder` files whose name contains `prefix`
    ///
    /// The name filter is a substring match on the server; callers must
    /// still check the prefix.
    pub async fn list_page(
        &self,
        token: &AccessToken,
        prefix: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<VersionPage, RemoteError> {
        let query = format!("name contains '{}' and trashed = false", prefix);
        let page_size = page_size.to_string();
        let mut params = vec![
            ("spaces", APP_DATA_FOLDER),
            ("q", query.as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", page_size.as_str()),
        ];
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token));
        }

        let response = send(self.request(Method::GET, "/files", token).query(&params)).await?;
        let list: FileListResponse = decode_json(response).await?;

        debug!(
            count = list.files.len(),
            more = list.next_page_token.is_some(),
            "Listed version page"
        );

        Ok(VersionPage {
            files: list.files.into_iter().map(RemoteVersion::from).collect(),
            next_page_token: list.next_page_token,
        })
    }

    /// Downloads a file's content by id
    pub async fn download(&self, token: &AccessToken, id: &str) -> Result<Vec<u8>, RemoteError> {
        let path = format!("/files/{}", id);
        let response = send(
            self.request(Method::GET, &path, token)
                .query(&[("alt", "media")]),
        )
        .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        debug!(id, bytes = bytes.len(), "Downloaded version");
        Ok(bytes.to_vec())
    }

    /// Creates a new JSON file in `appDataFolder` with a multipart upload
    ///
    /// The body is `multipart/related`: a JSON metadata part followed by
    /// the JSON content part.
    pub async fn create_json(
        &self,
        token: &AccessToken,
        name: &str,
        content: &[u8],
    ) -> Result<RemoteVersion, RemoteError> {
        let boundary = format!("dutyledger-{}", uuid::Uuid::new_v4().simple());
        let metadata = serde_json::json!({
            "name": name,
            "parents": [APP_DATA_FOLDER],
            "mimeType": "application/json",
        });
        let body = multipart_related(&boundary, &metadata, content);

        let url = format!("{}/files", self.upload_base_url);
        let request = self
            .client
            .post(url)
            .bearer_auth(token.secret())
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body);

        let file: DriveFile = decode_json(send(request).await?).await?;
        debug!(id = %file.id, name = %file.name, "Created version");
        Ok(file.into())
    }

    /// Deletes a file permanently by id
    pub async fn delete(&self, token: &AccessToken, id: &str) -> Result<(), RemoteError> {
        let path = format!("/files/{}", id);
        send(self.request(Method::DELETE, &path, token)).await?;
        debug!(id, "Deleted version");
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Sends a request and maps every non-success status to [`RemoteError::Status`]
async fn send(request: RequestBuilder) -> Result<Response, RemoteError> {
    let response = request
        .send()
        .await
        .map_err(|e| RemoteError::Network(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        message: error_message(status, &body),
    })
}

async fn decode_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RemoteError::Network(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

/// Extracts the provider's message from an error body
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.chars().take(200).collect())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string())
}

fn multipart_related(boundary: &str, metadata: &serde_json::Value, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
