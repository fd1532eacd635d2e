//! Transport Traits
//!
//! The client never talks HTTP directly. It hands a [`FetchRequest`] to a
//! [`Transport`] and gets back either a [`FetchResponse`] or a
//! [`TransportError`]. Base URL, authentication and cancellation belong to
//! the transport.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

/// HTTP method
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

impl Method {
    /// Canonical method name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound call
#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the transport's base URL
    pub url: String,
    /// Query string parameters
    pub params: Vec<(String, String)>,
    /// JSON body
    pub data: Option<Value>,
    /// Correlation id
    pub request_id: Option<String>,
    /// Whether failures should be reported loudly
    pub show_error_alert: bool,
}

impl FetchRequest {
    /// Request with the given method and path
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Vec::new(),
            data: None,
            request_id: None,
            show_error_alert: true,
        }
    }

    /// GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// POST request with an optional body
    pub fn post(url: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            data,
            ..Self::new(Method::Post, url)
        }
    }

    /// Set query string parameters
    #[must_use]
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// Set the correlation id
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Enable or suppress failure alerting
    #[must_use]
    pub fn with_error_alert(mut self, show: bool) -> Self {
        self.show_error_alert = show;
        self
    }
}

/// Completed call
#[derive(Clone, Debug, PartialEq)]
pub struct FetchResponse {
    /// HTTP status
    pub status: u16,
    /// HTTP reason phrase
    pub status_text: String,
    /// Decoded JSON body (`Null` when empty)
    pub data: Value,
    /// Correlation id echoed back
    pub request_id: Option<String>,
}

/// Outbound call primitive
///
/// Implementations must be safe to share between concurrent callers.
/// Dropping the future returned by `fetch` cancels the call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Perform one call
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, TransportError>;

    /// Perform one call and keep only the body
    async fn request(&self, request: FetchRequest) -> Result<Value, TransportError> {
        self.fetch(request).await.map(|response| response.data)
    }

    /// GET and return the body
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value, TransportError> {
        self.request(FetchRequest::get(url).with_params(params.to_vec()))
            .await
    }

    /// POST and return the body
    async fn post(&self, url: &str, body: Option<Value>) -> Result<Value, TransportError> {
        self.request(FetchRequest::post(url, body)).await
    }
}
