//! HTTP transport seam
//!
//! The gateway talks to the backend only through [`Transport`], so retry and
//! refresh policy can be exercised without a live server.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// A file attached to a multipart request
///
/// Held as owned bytes so the request can be rebuilt for a retry.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing the MIME type from its extension
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = match extension_of(&file_name).as_deref() {
            Some("pdf") => "application/pdf",
            Some("txt") => "text/plain",
            _ => "application/octet-stream",
        };
        Ok(Self::new(file_name, mime, bytes))
    }

    /// Lowercase extension of the file name, if any
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.file_name)
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    File(FilePart),
}

/// One fully-resolved HTTP attempt
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path relative to the configured base URL, starting with `/`
    pub path: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
    pub timeout: Duration,
}

/// Response with the body already read
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn json_body(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Deserialize the body, `None` when it is not the expected shape
    pub fn json<T: DeserializeOwned>(&self) -> Option<T> {
        match serde_json::from_str(&self.body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Unexpected response body ({}): {}", self.status, e);
                None
            }
        }
    }

    /// The backend's `detail` field when it is a string
    pub fn detail(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(&self.body).ok()?;
        value.get("detail")?.as_str().map(str::to_string)
    }
}

/// Transport-level failures, classified the way the session reports them
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Other(String),
}

impl TransportError {
    /// Convert network/connection errors into a typed variant
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::ConnectionRefused(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }

    /// Notice text shown to the user for this failure
    pub fn user_message(&self, base_url: &str) -> String {
        match self {
            TransportError::ConnectionRefused(_) => {
                format!("Could not connect to backend at {}. Is it running?", base_url)
            }
            TransportError::Timeout => {
                "Request timed out. The server took too long to respond.".to_string()
            }
            TransportError::Other(e) => format!("Network error: {}", e),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL requests are resolved against, for messages and logs
    fn base_url(&self) -> &str;

    /// Issue a single request; never retries
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest`
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &url::Url) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(TransportError::from_reqwest)?;
        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn resolve(&self, path: &str) -> Result<url::Url, TransportError> {
        let full = format!("{}{}", self.base_url, path);
        url::Url::parse(&full).map_err(|e| TransportError::Other(format!("{}: {}", full, e)))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.resolve(&request.path)?;
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .timeout(request.timeout);

        if let Some(token) = &request.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::File(file) => {
                let part = reqwest::multipart::Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime)
                    .map_err(TransportError::from_reqwest)?;
                builder.multipart(reqwest::multipart::Form::new().part("file", part))
            }
        };

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(TransportError::from_reqwest)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
