//! HTTP Transport
//!
//! [`Transport`] over `reqwest`. Paths are joined onto the configured base
//! URL; the bearer token, organization header and correlation id are added
//! to every call.

use async_trait::async_trait;
use serde_json::Value;

use super::traits::{FetchRequest, FetchResponse, Method, Transport};
use crate::config::ClientSettings;
use crate::error::TransportError;

/// Header carrying the correlation id
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Header selecting the organization
pub const ORG_ID_HEADER: &str = "X-Grafana-Org-Id";

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    /// Base URL without trailing slash
    base_url: String,
    /// Bearer token
    api_token: Option<String>,
    /// Organization header value
    org_id: Option<i64>,
    /// HTTP client
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("org_id", &self.org_id)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport from client settings
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(settings: &ClientSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_token: settings.api_token.clone(),
            org_id: None,
            client,
        })
    }

    /// Send the organization header on every call
    #[must_use]
    pub fn with_org_id(mut self, org_id: i64) -> Self {
        self.org_id = Some(org_id);
        self
    }

    /// Base URL calls are made against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }

    fn report(request: &FetchRequest, error: &TransportError) {
        if request.show_error_alert {
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                status = ?error.status,
                error = %error,
                "Request failed"
            );
        } else {
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                status = ?error.status,
                error = %error,
                "Request failed"
            );
        }
    }

    fn send_error(error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::timeout(error.to_string())
        } else {
            TransportError::network(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, TransportError> {
        let mut builder = self
            .client
            .request(Self::method(request.method), self.url(&request.url));

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(ref token) = self.api_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(org_id) = self.org_id {
            builder = builder.header(ORG_ID_HEADER, org_id.to_string());
        }
        if let Some(ref request_id) = request.request_id {
            builder = builder.header(REQUEST_ID_HEADER, request_id.as_str());
        }
        if let Some(ref body) = request.data {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = Self::send_error(&e);
                Self::report(&request, &error);
                return Err(error);
            }
        };

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = Self::send_error(&e);
                Self::report(&request, &error);
                return Err(error);
            }
        };

        let data = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(data) => data,
                Err(_) if !status.is_success() => {
                    serde_json::json!({ "message": String::from_utf8_lossy(&bytes) })
                }
                Err(e) => {
                    let error = TransportError::decode(
                        status.as_u16(),
                        format!("Invalid JSON in response: {e}"),
                    );
                    Self::report(&request, &error);
                    return Err(error);
                }
            }
        };

        if !status.is_success() {
            let error = TransportError::status(status.as_u16(), status_text, Some(data));
            Self::report(&request, &error);
            return Err(error);
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text,
            data,
            request_id: request.request_id,
        })
    }
}
