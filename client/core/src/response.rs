//! Response Normalization
//!
//! Every outcome of the query endpoint, successful or not, is decoded into a
//! [`NormalizedResult`]. The dispatcher feeds both the success channel and
//! the error channel of the transport through [`decode`], so callers only
//! ever switch on [`NormalizedResult::state`].
//!
//! # Wire Format
//!
//! ```text
//! {"results": {
//!     "A": {"frames": [{"schema": {...}, "data": {"values": [[...], ...]}}]},
//!     "B": {"error": "parse error", "status": 400},
//!     "C": {"series": [{"name": "cpu", "points": [[0.5, 1700000000000]]}]}
//! }}
//! ```
//!
//! `results` is read in key order, so frames come out sorted by refId.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::transport::FetchResponse;

// ============================================================================
// Frames
// ============================================================================

/// Column type of a frame field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Timestamps (epoch milliseconds)
    Time,
    /// Numeric values
    Number,
    /// Strings
    String,
    /// Booleans
    Boolean,
    /// Anything else
    #[default]
    #[serde(other)]
    Other,
}

impl FieldType {
    fn from_wire(name: &str) -> Self {
        match name {
            "time" => Self::Time,
            "number" => Self::Number,
            "string" => Self::String,
            "boolean" => Self::Boolean,
            _ => Self::Other,
        }
    }
}

/// One column of a frame
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Column name
    pub name: String,
    /// Column type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Display configuration, passed through untouched
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    /// Series labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    /// Column values
    #[serde(default)]
    pub values: Vec<Value>,
}

impl Field {
    /// Field with values and no config
    pub fn new(name: impl Into<String>, field_type: FieldType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            field_type,
            values,
            ..Default::default()
        }
    }
}

/// A typed result table
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFrame {
    /// Frame name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Target the frame answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    /// Backend-specific metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Columns
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl DataFrame {
    /// Frame with the given fields
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    /// Set the refId
    #[must_use]
    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }

    /// Number of rows (the longest column)
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.iter().map(|f| f.values.len()).max().unwrap_or(0)
    }

    /// Whether the frame has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field by exact name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// First field of the given type
    #[must_use]
    pub fn first_field_of_type(&self, field_type: FieldType) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_type == field_type)
    }

    /// Decode a JSON data frame (`schema` + `data.values`)
    fn from_wire(value: &Value) -> Option<Self> {
        let schema = value.get("schema")?;
        let mut columns = value
            .get("data")
            .and_then(|d| d.get("values"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter();

        let fields = schema
            .get("fields")
            .and_then(Value::as_array)
            .map(|defs| {
                defs.iter()
                    .map(|def| Field {
                        name: str_at(def, "name").unwrap_or_default(),
                        field_type: def
                            .get("type")
                            .and_then(Value::as_str)
                            .map_or(FieldType::Other, FieldType::from_wire),
                        config: def
                            .get("config")
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default(),
                        labels: def.get("labels").and_then(labels_from),
                        values: match columns.next() {
                            Some(Value::Array(values)) => values,
                            _ => Vec::new(),
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name: str_at(schema, "name"),
            ref_id: str_at(schema, "refId"),
            meta: schema.get("meta").cloned(),
            fields,
        })
    }

    /// Decode a legacy time series (`points` as `[value, time]` pairs)
    fn from_series(value: &Value) -> Option<Self> {
        let points = value.get("points")?.as_array()?;
        let (values, times): (Vec<Value>, Vec<Value>) = points
            .iter()
            .filter_map(|p| {
                let pair = p.as_array()?;
                Some((pair.first()?.clone(), pair.get(1)?.clone()))
            })
            .unzip();

        let mut value_field = Field::new("Value", FieldType::Number, values);
        value_field.labels = value.get("tags").and_then(labels_from);

        Some(Self {
            name: str_at(value, "name"),
            ref_id: str_at(value, "refId"),
            meta: None,
            fields: vec![Field::new("Time", FieldType::Time, times), value_field],
        })
    }
}

fn str_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

fn labels_from(value: &Value) -> Option<BTreeMap<String, String>> {
    let map = value.as_object()?;
    Some(
        map.iter()
            .map(|(k, v)| {
                let text = v.as_str().map_or_else(|| v.to_string(), String::from);
                (k.clone(), text)
            })
            .collect(),
    )
}

// ============================================================================
// Normalized Result
// ============================================================================

/// Discriminant of a [`NormalizedResult`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadingState {
    /// Query completed
    #[default]
    Done,
    /// Query failed; `error` is set
    Error,
}

/// Failure description
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQueryError {
    /// Target that failed, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    /// Human-readable message
    pub message: String,
    /// HTTP status, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// The one shape returned for every dispatched batch
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    /// Success or failure
    pub state: LoadingState,
    /// Result frames (may be non-empty even on failure)
    pub data: Vec<DataFrame>,
    /// First error encountered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DataQueryError>,
}

impl NormalizedResult {
    /// Successful result without frames
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the result is a failure
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.state == LoadingState::Error
    }

    /// Record an error unless one is already present
    fn set_error(&mut self, error: DataQueryError) {
        self.state = LoadingState::Error;
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Input to [`decode`]: either channel of a transport call
#[derive(Clone, Debug)]
pub enum RawReply {
    /// The call completed
    Response(FetchResponse),
    /// The call failed
    Error(TransportError),
}

impl From<FetchResponse> for RawReply {
    fn from(response: FetchResponse) -> Self {
        Self::Response(response)
    }
}

impl From<TransportError> for RawReply {
    fn from(error: TransportError) -> Self {
        Self::Error(error)
    }
}

/// Normalize a reply or a transport error
///
/// Total: any input produces a result. Per-target errors from the body are
/// reported first; a failed call without one gets an error derived from the
/// body's `message`/`error`, the status text or the transport message.
pub fn decode(raw: impl Into<RawReply>) -> NormalizedResult {
    let raw = raw.into();
    let (status, body) = match &raw {
        RawReply::Response(response) => (Some(response.status), Some(&response.data)),
        RawReply::Error(error) => (error.status, error.data.as_ref()),
    };

    let mut result = NormalizedResult::empty();

    if let Some(results) = body
        .and_then(|b| b.get("results"))
        .and_then(Value::as_object)
    {
        for (ref_id, entry) in results {
            decode_entry(ref_id, entry, &mut result);
        }
    }

    let failed = match &raw {
        RawReply::Response(response) => !(200..300).contains(&response.status),
        RawReply::Error(_) => true,
    };

    if failed {
        let message = body
            .and_then(|b| str_at(b, "message").or_else(|| str_at(b, "error")))
            .or_else(|| match &raw {
                RawReply::Response(response) => {
                    Some(response.status_text.clone()).filter(|s| !s.is_empty())
                }
                RawReply::Error(error) => error
                    .status_text
                    .clone()
                    .filter(|s| !s.is_empty())
                    .or_else(|| Some(error.message.clone())),
            })
            .unwrap_or_else(|| "Query error".to_string());

        result.set_error(DataQueryError {
            ref_id: None,
            message,
            status,
        });
    }

    result
}

fn decode_entry(ref_id: &str, entry: &Value, result: &mut NormalizedResult) {
    if let Some(message) = entry.get("error").and_then(Value::as_str) {
        result.set_error(DataQueryError {
            ref_id: Some(ref_id.to_string()),
            message: message.to_string(),
            status: entry
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok()),
        });
    }

    let frames = entry
        .get("frames")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|f| (f, DataFrame::from_wire(f)));
    let series = entry
        .get("series")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|s| (s, DataFrame::from_series(s)));

    for (raw, decoded) in frames.chain(series) {
        match decoded {
            Some(mut frame) => {
                if frame.ref_id.is_none() {
                    frame.ref_id = Some(ref_id.to_string());
                }
                result.data.push(frame);
            }
            None => tracing::debug!(ref_id, frame = %raw, "Skipping undecodable frame"),
        }
    }
}
