/// Remote store client for the single board file in the user's Drive
/// app-data folder.
///
/// Requests go through [`DriveClient::authorized_fetch`], which attaches a
/// bearer token and handles one round of re-authorization on 401.
use std::sync::Arc;

use async_trait::async_trait;
use kanbanx_core::types::AppState;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::auth::{AuthError, TokenProvider};

pub const DRIVE_FILE_NAME: &str = "kanbanx-boards.json";
pub const APP_DATA_FOLDER: &str = "appDataFolder";
const JSON_PART_TYPE: &str = "application/json; charset=UTF-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Token acquisition may involve the user.
    pub interactive: bool,
    /// On 401, drop the token and retry once interactively.
    pub retry_on_auth_error: bool,
}

impl RequestOptions {
    /// Background load/save: never prompts, never retries.
    pub const PASSIVE: Self = Self {
        interactive: false,
        retry_on_auth_error: false,
    };

    /// Explicit user action such as connecting.
    pub const INTERACTIVE: Self = Self {
        interactive: true,
        retry_on_auth_error: true,
    };
}

/// Result of a request that needs authorization. `Unavailable` means a
/// non-interactive call could not get a token; it is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access<T> {
    Unavailable,
    Granted(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    fn new(method: Method, url: String) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, RemoteError> {
        serde_json::from_slice(&self.body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Authorization failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Drive authorization unavailable")]
    Unavailable,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to {operation} Drive file ({status})")]
    Status { operation: &'static str, status: u16 },

    #[error("Unexpected Drive response: {0}")]
    InvalidResponse(String),

    #[error("Unable to encode board state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sends one HTTP request. Seam between the Drive protocol and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

/// The four remote-file operations the sync layer needs.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Id of the non-trashed board file, if there is one.
    async fn find_existing_file(&self, opts: RequestOptions) -> Result<Access<Option<String>>, RemoteError>;

    /// Upload a new board file and return its id.
    async fn create_file(&self, state: &AppState, opts: RequestOptions) -> Result<Access<String>, RemoteError>;

    /// Overwrite the file. The raw response is returned so callers can
    /// react to 404.
    async fn update_file(
        &self,
        file_id: &str,
        state: &AppState,
        opts: RequestOptions,
    ) -> Result<Access<HttpResponse>, RemoteError>;

    /// Raw media content of the file.
    async fn read_file(&self, file_id: &str, opts: RequestOptions) -> Result<Access<HttpResponse>, RemoteError>;
}

pub struct DriveClient {
    api_base: String,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
}

impl DriveClient {
    pub fn new(api_base: impl Into<String>, transport: Arc<dyn Transport>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            transport,
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Send `request` with a bearer token. A 401 is retried at most once,
    /// and only when the caller opted in.
    pub async fn authorized_fetch(
        &self,
        request: HttpRequest,
        opts: RequestOptions,
    ) -> Result<Access<HttpResponse>, RemoteError> {
        let mut opts = opts;
        loop {
            let token = match self.tokens.get_token(opts.interactive).await {
                Ok(token) => token,
                Err(e) if !opts.interactive => {
                    log::warn!(target: "kanbanx.drive", "Non-interactive token request failed: {}", e);
                    return Ok(Access::Unavailable);
                }
                Err(e) => return Err(e.into()),
            };

            let mut authed = request.clone();
            authed
                .headers
                .push(("Authorization".to_string(), format!("Bearer {}", token)));
            let response = self.transport.send(authed).await?;

            if response.status == 401 && opts.retry_on_auth_error {
                log::info!(target: "kanbanx.drive", "Token rejected, re-authorizing once");
                self.tokens.invalidate(&token).await;
                opts = RequestOptions {
                    interactive: true,
                    retry_on_auth_error: false,
                };
                continue;
            }
            return Ok(Access::Granted(response));
        }
    }

    fn multipart_request(
        &self,
        method: Method,
        url: String,
        metadata: serde_json::Value,
        state: &AppState,
    ) -> Result<HttpRequest, RemoteError> {
        let (body, boundary) = build_multipart_body(&metadata, state)?;
        let mut request = HttpRequest::new(method, url);
        request.headers.push((
            "Content-Type".to_string(),
            format!("multipart/related; boundary={}", boundary),
        ));
        request.body = Some(body);
        Ok(request)
    }
}

/// Two JSON parts, metadata then content, with a random boundary.
pub fn build_multipart_body(
    metadata: &serde_json::Value,
    state: &AppState,
) -> Result<(String, String), RemoteError> {
    let boundary = format!("-------{}", uuid::Uuid::new_v4().simple());
    let body = format!(
        "--{b}\r\nContent-Type: {t}\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n{content}\r\n--{b}--",
        b = boundary,
        t = JSON_PART_TYPE,
        meta = serde_json::to_string(metadata)?,
        content = serde_json::to_string(state)?,
    );
    Ok((body, boundary))
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn find_existing_file(&self, opts: RequestOptions) -> Result<Access<Option<String>>, RemoteError> {
        let query = format!("name = '{}' and trashed = false", DRIVE_FILE_NAME);
        let url = self.url(&format!(
            "/drive/v3/files?spaces={}&fields=files(id,name,modifiedTime)&q={}",
            APP_DATA_FOLDER,
            encode(&query)
        ));
        let response = match self.authorized_fetch(HttpRequest::new(Method::Get, url), opts).await? {
            Access::Granted(response) => response,
            Access::Unavailable => return Ok(Access::Unavailable),
        };
        if !response.is_success() {
            return Err(RemoteError::Status {
                operation: "query",
                status: response.status,
            });
        }

        #[derive(Deserialize)]
        struct FileList {
            #[serde(default)]
            files: Vec<FileRef>,
        }

        let list: FileList = response.json()?;
        Ok(Access::Granted(list.files.into_iter().next().map(|f| f.id)))
    }

    async fn create_file(&self, state: &AppState, opts: RequestOptions) -> Result<Access<String>, RemoteError> {
        let metadata = json!({ "name": DRIVE_FILE_NAME, "parents": [APP_DATA_FOLDER] });
        let url = self.url("/upload/drive/v3/files?uploadType=multipart&fields=id");
        let request = self.multipart_request(Method::Post, url, metadata, state)?;
        let response = match self.authorized_fetch(request, opts).await? {
            Access::Granted(response) => response,
            Access::Unavailable => return Ok(Access::Unavailable),
        };
        if !response.is_success() {
            return Err(RemoteError::Status {
                operation: "create",
                status: response.status,
            });
        }
        let created: FileRef = response.json()?;
        if created.id.is_empty() {
            return Err(RemoteError::InvalidResponse("created file has no id".to_string()));
        }
        log::info!(target: "kanbanx.drive", "Created Drive file {}", created.id);
        Ok(Access::Granted(created.id))
    }

    async fn update_file(
        &self,
        file_id: &str,
        state: &AppState,
        opts: RequestOptions,
    ) -> Result<Access<HttpResponse>, RemoteError> {
        let metadata = json!({ "name": DRIVE_FILE_NAME });
        let url = self.url(&format!(
            "/upload/drive/v3/files/{}?uploadType=multipart&fields=id",
            encode(file_id)
        ));
        let request = self.multipart_request(Method::Patch, url, metadata, state)?;
        self.authorized_fetch(request, opts).await
    }

    async fn read_file(&self, file_id: &str, opts: RequestOptions) -> Result<Access<HttpResponse>, RemoteError> {
        let url = self.url(&format!("/drive/v3/files/{}?alt=media", encode(file_id)));
        self.authorized_fetch(HttpRequest::new(Method::Get, url), opts).await
    }
}

#[derive(Deserialize)]
struct FileRef {
    #[serde(default)]
    id: String,
}
