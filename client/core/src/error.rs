//! Error Types
//!
//! Errors surfaced by the query client. Transport failures are normally
//! absorbed into a [`NormalizedResult`](crate::response::NormalizedResult)
//! by the dispatcher; only the resource calls let them through unchanged.

use serde_json::Value;
use thiserror::Error;

/// Errors raised while preparing a batch, before anything is sent
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// A target's backend reference is not present in the runtime settings
    #[error("Unknown datasource: {reference}")]
    UnknownBackend {
        /// The reference as the caller wrote it
        reference: String,
    },
}

impl QueryError {
    /// Shorthand for [`QueryError::UnknownBackend`]
    pub fn unknown_backend(reference: impl Into<String>) -> Self {
        Self::UnknownBackend {
            reference: reference.into(),
        }
    }
}

/// Category of a transport failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not reach the server
    Network,
    /// Server answered with a non-2xx status
    Status,
    /// Reply body could not be decoded
    Decode,
    /// Request timed out at the transport layer
    Timeout,
    /// Request body could not be encoded
    Encode,
}

/// Failure of an outbound call
///
/// `data` holds the decoded error body when the server sent one; callers
/// use it as a fallback payload (health checks, error normalization).
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}")]
pub struct TransportError {
    /// Failure category
    pub kind: TransportErrorKind,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// HTTP reason phrase, when a response was received
    pub status_text: Option<String>,
    /// Human-readable description
    pub message: String,
    /// Error body sent by the server
    pub data: Option<Value>,
}

impl TransportError {
    /// Connection-level failure
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Network,
            status: None,
            status_text: None,
            message: message.into(),
            data: None,
        }
    }

    /// Timeout at the transport layer
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            ..Self::network(message)
        }
    }

    /// Body could not be decoded
    pub fn decode(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Decode,
            status: Some(status),
            ..Self::network(message)
        }
    }

    /// Request body could not be encoded; nothing was sent
    pub fn encode(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Encode,
            ..Self::network(message)
        }
    }

    /// Non-2xx reply, optionally carrying the error body
    pub fn status(status: u16, status_text: impl Into<String>, data: Option<Value>) -> Self {
        let status_text = status_text.into();
        Self {
            kind: TransportErrorKind::Status,
            status: Some(status),
            message: format!("Request failed with status {status} {status_text}")
                .trim_end()
                .to_string(),
            status_text: Some(status_text),
            data,
        }
    }
}
