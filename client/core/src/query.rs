//! Query Types
//!
//! Caller-facing request types and the wire envelope sent to the query
//! endpoint. Targets are opaque JSON objects owned by the datasource plugin;
//! the client only reads the handful of fields it routes on.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved backend reference for server-side expressions
pub const EXPRESSION_DATASOURCE: &str = "__expr__";

/// Reserved backend reference for the configured default datasource
pub const DEFAULT_DATASOURCE: &str = "default";

/// Keys the builder owns on every outbound query
pub(crate) const RESERVED_QUERY_KEYS: [&str; 4] =
    ["datasourceId", "orgId", "intervalMs", "maxDataPoints"];

// ============================================================================
// Backend Reference
// ============================================================================

/// Which datasource a target should run against
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendRef {
    /// Explicit numeric datasource id
    Id(i64),
    /// Datasource name, `"default"`, or the expression marker
    Name(String),
}

impl BackendRef {
    /// Reference to a datasource by name
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// The expression pseudo-datasource
    #[must_use]
    pub fn expression() -> Self {
        Self::Name(EXPRESSION_DATASOURCE.to_string())
    }

    /// The configured default datasource
    #[must_use]
    pub fn default_datasource() -> Self {
        Self::Name(DEFAULT_DATASOURCE.to_string())
    }

    /// Whether this reference marks an expression target
    #[must_use]
    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Name(name) if name == EXPRESSION_DATASOURCE)
    }
}

impl fmt::Display for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

// ============================================================================
// Query Target
// ============================================================================

/// One query descriptor
///
/// Everything besides `refId`, `datasource` and `hide` is kept verbatim in
/// `fields` and forwarded to the backend untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTarget {
    /// Identifier correlating the target with its result frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    /// Datasource to run against (absent = the client's own datasource)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<BackendRef>,
    /// Hidden targets still run; the flag is forwarded for the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide: Option<bool>,
    /// Plugin-specific query fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl QueryTarget {
    /// Create a target with the given refId
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: Some(ref_id.into()),
            ..Default::default()
        }
    }

    /// Set the backend reference
    #[must_use]
    pub fn with_datasource(mut self, datasource: BackendRef) -> Self {
        self.datasource = Some(datasource);
        self
    }

    /// Set a plugin-specific field
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Whether this target is routed to the expression engine
    #[must_use]
    pub fn is_expression(&self) -> bool {
        self.datasource
            .as_ref()
            .is_some_and(BackendRef::is_expression)
    }
}

// ============================================================================
// Time Range
// ============================================================================

/// Raw (possibly relative) bounds as the user entered them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTimeRange {
    /// Lower bound, e.g. `now-6h`
    pub from: String,
    /// Upper bound, e.g. `now`
    pub to: String,
}

/// Absolute time range with the raw bounds it was resolved from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive lower bound
    pub from: DateTime<Utc>,
    /// Inclusive upper bound
    pub to: DateTime<Utc>,
    /// Unresolved bounds
    pub raw: RawTimeRange,
}

impl TimeRange {
    /// Absolute range; the raw bounds are the RFC 3339 forms
    #[must_use]
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            raw: RawTimeRange {
                from: from.to_rfc3339(),
                to: to.to_rfc3339(),
            },
        }
    }

    /// Absolute range from epoch milliseconds
    #[must_use]
    pub fn from_millis(from_ms: i64, to_ms: i64) -> Option<Self> {
        Some(Self::new(
            DateTime::from_timestamp_millis(from_ms)?,
            DateTime::from_timestamp_millis(to_ms)?,
        ))
    }

    /// Replace the raw bounds
    #[must_use]
    pub fn with_raw(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.raw = RawTimeRange {
            from: from.into(),
            to: to.into(),
        };
        self
    }

    /// Lower bound as epoch milliseconds
    #[must_use]
    pub fn from_millis_value(&self) -> i64 {
        self.from.timestamp_millis()
    }

    /// Upper bound as epoch milliseconds
    #[must_use]
    pub fn to_millis_value(&self) -> i64 {
        self.to.timestamp_millis()
    }
}

// ============================================================================
// Scoped Variables
// ============================================================================

/// A substitution variable
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScopedVar {
    /// Display text
    pub text: String,
    /// Substituted value
    pub value: Value,
}

impl ScopedVar {
    /// Variable whose text and value are the same string
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            text: value.clone(),
            value: Value::String(value),
        }
    }
}

/// Variables visible while building one batch
pub type ScopedVars = HashMap<String, ScopedVar>;

// ============================================================================
// Batch Request
// ============================================================================

fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn default_interval() -> String {
    "1m".to_string()
}

/// A set of targets sharing one range, interval and correlation id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    /// Correlation id forwarded to the transport
    #[serde(default = "new_request_id")]
    pub request_id: String,
    /// Targets in dispatch order
    #[serde(default)]
    pub targets: Vec<QueryTarget>,
    /// Shared time range
    #[serde(default)]
    pub range: Option<TimeRange>,
    /// Dashboard timezone
    #[serde(default)]
    pub timezone: Option<String>,
    /// Interval hint, e.g. `1m`
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Interval hint in milliseconds
    #[serde(default)]
    pub interval_ms: Option<u64>,
    /// Maximum number of points the caller can render
    #[serde(default)]
    pub max_data_points: Option<u64>,
    /// Variables available for substitution
    #[serde(default)]
    pub scoped_vars: ScopedVars,
}

impl Default for BatchRequest {
    fn default() -> Self {
        Self {
            request_id: new_request_id(),
            targets: Vec::new(),
            range: None,
            timezone: None,
            interval: default_interval(),
            interval_ms: None,
            max_data_points: None,
            scoped_vars: ScopedVars::new(),
        }
    }
}

impl BatchRequest {
    /// Create a batch with a fresh request id
    #[must_use]
    pub fn new(targets: Vec<QueryTarget>) -> Self {
        Self {
            targets,
            ..Default::default()
        }
    }

    /// Set the request id
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Set the time range
    #[must_use]
    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Set the interval hint
    #[must_use]
    pub fn with_interval(mut self, interval: impl Into<String>, interval_ms: u64) -> Self {
        self.interval = interval.into();
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Set the max data points hint
    #[must_use]
    pub fn with_max_data_points(mut self, max_data_points: u64) -> Self {
        self.max_data_points = Some(max_data_points);
        self
    }

    /// Add a scoped variable
    #[must_use]
    pub fn with_scoped_var(mut self, name: impl Into<String>, var: ScopedVar) -> Self {
        self.scoped_vars.insert(name.into(), var);
        self
    }

    /// Set the timezone
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

// ============================================================================
// Outbound Payload
// ============================================================================

/// A target annotated for the wire
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadQuery {
    /// The (possibly substituted) target
    #[serde(flatten)]
    pub target: QueryTarget,
    /// Resolved datasource id
    pub datasource_id: i64,
    /// Organization the query runs in
    pub org_id: i64,
    /// Shared interval hint (absent on expression targets)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Shared max data points hint (absent on expression targets)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_data_points: Option<u64>,
}

/// Body of one call to the query endpoint
///
/// `range`, `from` and `to` are either all present or all absent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutboundPayload {
    /// Annotated targets in input order
    pub queries: Vec<PayloadQuery>,
    /// Native range object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,
    /// Lower bound as a string of epoch milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Upper bound as a string of epoch milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl OutboundPayload {
    /// Payload without a range block
    #[must_use]
    pub fn new(queries: Vec<PayloadQuery>) -> Self {
        Self {
            queries,
            range: None,
            from: None,
            to: None,
        }
    }

    /// Attach the range block in both its native and string forms
    #[must_use]
    pub fn with_range(mut self, range: &TimeRange) -> Self {
        self.from = Some(range.from_millis_value().to_string());
        self.to = Some(range.to_millis_value().to_string());
        self.range = Some(range.clone());
        self
    }
}
