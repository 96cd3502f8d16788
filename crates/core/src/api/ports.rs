//! Port interface between the call executor and the HTTP transport

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::auth::Credential;

/// HTTP method of a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// One remote operation descriptor: method, path, query, optional JSON body.
///
/// Parameters are explicit and structured; there is no catch-all keyword
/// bag threaded through the layers.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: HttpMethod::Get, path: path.into(), query: Vec::new(), body: None }
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self { method: HttpMethod::Post, path: path.into(), query: Vec::new(), body: Some(body) }
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Replace (or insert) a single query parameter. Used to thread the page
    /// cursor between page fetches.
    pub fn set_query(&mut self, key: &str, value: String) {
        if let Some(entry) = self.query.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.query.push((key.to_string(), value));
        }
    }
}

/// Transport response: HTTP status plus the parsed JSON body.
///
/// Non-2xx responses come back through here as well; classifying them is the
/// executor's job, not the transport's.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network-level transport failure. Always retryable up to the ceiling.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),
}

/// Executes a single HTTP exchange against the remote API.
///
/// Implementations authorize the request with the supplied credential and
/// perform exactly one attempt; retry policy lives in the executor.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn execute(
        &self,
        credential: &Credential,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError>;
}
