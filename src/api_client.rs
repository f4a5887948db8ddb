//! Remote API Boundary
//!
//! The engine talks to the server through [`RemoteApi`]: one request in,
//! one response out, keyed by method + path + body. [`HttpRemoteApi`] is the
//! reqwest implementation used in production; tests substitute their own.

use crate::shared::config::AppConfig;
use crate::shared::error::SyncError;
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;

/// HTTP methods the routing table produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single remote operation
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: HttpMethod,
    /// Path relative to the server URL, e.g. `/api/jobs/job_1`
    pub path: String,
    /// JSON body, absent for deletes
    pub body: Option<serde_json::Value>,
}

impl fmt::Display for RemoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// The server's answer
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    /// Parsed JSON body, if the server sent one
    pub body: Option<serde_json::Value>,
}

impl RemoteResponse {
    pub fn new(status: u16, body: Option<serde_json::Value>) -> Self {
        Self { status, body }
    }

    /// Any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Message from an `{ "error": { "message": ... } }` body
    pub fn error_message(&self) -> Option<String> {
        self.body
            .as_ref()?
            .get("error")?
            .get("message")?
            .as_str()
            .map(str::to_string)
    }

    /// Server-assigned id of a created entity, top level or under `data`
    pub fn created_id(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        let id = body
            .get("id")
            .or_else(|| body.get("data").and_then(|data| data.get("id")))?;

        match id {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Turn a non-success status into an error carrying the server's message
    pub fn into_result(self) -> Result<Self, SyncError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .error_message()
            .unwrap_or_else(|| format!("Request failed with status {}", self.status));
        Err(SyncError::http(self.status, message))
    }
}

/// Request/response boundary to the remote service
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status; `Err` is reserved for transport failures.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, SyncError>;
}

/// reqwest-backed [`RemoteApi`]
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    config: AppConfig,
    client: Client,
}

impl HttpRemoteApi {
    pub fn new(config: AppConfig) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, SyncError> {
        let url = self.config.api_url(&request.path);

        let mut builder = match request.method {
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Patch => self.client.patch(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };
        if let Some(token) = &self.config.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };

        tracing::debug!(%request, status, "Remote API responded");
        Ok(RemoteResponse { status, body })
    }
}
