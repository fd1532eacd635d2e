//! Health Results
//!
//! Shapes returned by the datasource health endpoint and the pass/fail
//! summary built from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health state reported by the backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// No status reported
    #[default]
    Unknown,
    /// Backend is healthy
    Ok,
    /// Backend reported a problem
    Error,
}

impl HealthStatus {
    fn from_wire(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "OK" => Self::Ok,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

/// Reply of a health check
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    /// Reported state
    pub status: HealthStatus,
    /// Reported message
    #[serde(default)]
    pub message: String,
    /// Backend-specific details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl HealthResult {
    /// Failure with a message and no details
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: message.into(),
            details: None,
        }
    }

    /// Read a health reply leniently
    ///
    /// Missing or unrecognized members fall back to their defaults, so any
    /// JSON value produces a result.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self {
            status: value
                .get("status")
                .and_then(Value::as_str)
                .map_or(HealthStatus::Unknown, HealthStatus::from_wire),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            details: value.get("details").filter(|d| !d.is_null()).cloned(),
        }
    }

    /// Whether the backend reported `OK`
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

/// Outcome of a connection test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Health was `OK`
    Success,
    /// Anything else
    Fail,
}

/// Pass/fail summary of a health check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Pass or fail
    pub status: TestStatus,
    /// Message reported by the backend
    pub message: String,
}

impl From<HealthResult> for TestResult {
    fn from(health: HealthResult) -> Self {
        Self {
            status: if health.is_ok() {
                TestStatus::Success
            } else {
                TestStatus::Fail
            },
            message: health.message,
        }
    }
}
