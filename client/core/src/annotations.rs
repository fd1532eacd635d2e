//! Annotation Queries
//!
//! Runs a dashboard annotation through the regular query pipeline:
//!
//! ```text
//! Gate ──> Compose ──> Dispatch ──> Extract
//!  │                      │
//!  └── disabled / no      └── failed result
//!      query: []              or no frames: []
//! ```
//!
//! Annotation rendering must never break a dashboard, so every failure
//! degrades to an empty event list.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::QueryError;
use crate::hooks::QueryHooks;
use crate::query::{BackendRef, BatchRequest, QueryTarget, ScopedVars, TimeRange};
use crate::response::{DataFrame, Field, FieldType, NormalizedResult};

/// Prefix of annotation request ids
pub const ANNOTATION_REQUEST_PREFIX: &str = "anno-";

/// Interval used when the annotation does not set one
pub const DEFAULT_ANNOTATION_INTERVAL: &str = "1m";

/// Interval in milliseconds used when the annotation does not set one
pub const DEFAULT_ANNOTATION_INTERVAL_MS: u64 = 60_000;

// ============================================================================
// Types
// ============================================================================

/// A saved annotation definition
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationQuery {
    /// Whether the annotation is shown
    #[serde(default)]
    pub enable: bool,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Datasource the annotation belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<BackendRef>,
    /// Color applied to events that carry none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_color: Option<String>,
    /// Interval override, e.g. `5m`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Interval override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Inline query target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryTarget>,
    /// Plugin-specific settings
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Dashboard context of an annotation request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardInfo {
    /// Dashboard uid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Dashboard timezone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// One annotation to evaluate over a dashboard range
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRequest {
    /// The annotation definition
    pub annotation: AnnotationQuery,
    /// Dashboard range
    pub range: TimeRange,
    /// Owning dashboard
    #[serde(default)]
    pub dashboard: DashboardInfo,
}

/// A point or region on the time axis
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationEvent {
    /// Event id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Start time (epoch milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// End time for regions (epoch milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_end: Option<i64>,
    /// Whether the event spans a region
    #[serde(default)]
    pub is_region: bool,
    /// Title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Marker color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Author login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Author email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Author avatar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Dashboard the event belongs to
    #[serde(default, rename = "dashboardUID", skip_serializing_if = "Option::is_none")]
    pub dashboard_uid: Option<String>,
    /// Panel the event belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_id: Option<i64>,
}

/// Events extracted from one frame
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEvents {
    /// Events in row order
    pub events: Vec<AnnotationEvent>,
}

// ============================================================================
// Extraction
// ============================================================================

fn value_at<'a>(field: Option<&'a Field>, row: usize) -> Option<&'a Value> {
    field
        .and_then(|f| f.values.get(row))
        .filter(|v| !v.is_null())
}

fn as_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse::<i64>().ok().or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc).timestamp_millis())
        }),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Read annotation events off a frame by field name
///
/// `time` falls back to the first time-typed field. `isRegion` is derived
/// from `timeEnd` when the frame does not carry it.
#[must_use]
pub fn extract_annotation_events(frame: &DataFrame) -> AnnotationEvents {
    let time = frame
        .field("time")
        .or_else(|| frame.first_field_of_type(FieldType::Time));
    let time_end = frame.field("timeEnd");
    let title = frame.field("title");
    let text = frame.field("text");
    let tags = frame.field("tags");
    let id = frame.field("id");
    let color = frame.field("color");
    let login = frame.field("login");
    let email = frame.field("email");
    let avatar_url = frame.field("avatarUrl");
    let dashboard_uid = frame.field("dashboardUID");
    let panel_id = frame.field("panelId");
    let is_region = frame.field("isRegion");

    let events = (0..frame.len())
        .map(|row| {
            let start = value_at(time, row).and_then(as_millis);
            let end = value_at(time_end, row).and_then(as_millis);
            let region = value_at(is_region, row)
                .and_then(Value::as_bool)
                .unwrap_or_else(|| matches!((start, end), (Some(s), Some(e)) if e > s));

            AnnotationEvent {
                id: value_at(id, row).and_then(as_text),
                time: start,
                time_end: end,
                is_region: region,
                title: value_at(title, row).and_then(as_text),
                text: value_at(text, row).and_then(as_text),
                tags: value_at(tags, row).map(as_tags).unwrap_or_default(),
                color: value_at(color, row).and_then(as_text),
                login: value_at(login, row).and_then(as_text),
                email: value_at(email, row).and_then(as_text),
                avatar_url: value_at(avatar_url, row).and_then(as_text),
                dashboard_uid: value_at(dashboard_uid, row).and_then(as_text),
                panel_id: value_at(panel_id, row).and_then(as_millis),
            }
        })
        .collect();

    AnnotationEvents { events }
}

// ============================================================================
// Translation
// ============================================================================

/// Single-target batch for an annotation
#[must_use]
pub fn compose(request: &AnnotationRequest, target: QueryTarget) -> BatchRequest {
    let annotation = &request.annotation;
    BatchRequest {
        request_id: format!(
            "{ANNOTATION_REQUEST_PREFIX}{}",
            Utc::now().timestamp_millis()
        ),
        targets: vec![target],
        range: Some(request.range.clone()),
        timezone: request.dashboard.timezone.clone(),
        interval: annotation
            .interval
            .clone()
            .unwrap_or_else(|| DEFAULT_ANNOTATION_INTERVAL.to_string()),
        interval_ms: Some(annotation.interval_ms.unwrap_or(DEFAULT_ANNOTATION_INTERVAL_MS)),
        max_data_points: None,
        scoped_vars: ScopedVars::new(),
    }
}

/// Evaluate an annotation and return its events
///
/// `dispatch` runs the composed batch; it is called at most once.
pub async fn translate_and_run<F, Fut>(
    request: &AnnotationRequest,
    hooks: &dyn QueryHooks,
    dispatch: F,
) -> Vec<AnnotationEvent>
where
    F: FnOnce(BatchRequest) -> Fut,
    Fut: Future<Output = Result<NormalizedResult, QueryError>>,
{
    let annotation = &request.annotation;
    if !annotation.enable {
        tracing::debug!(annotation = %annotation.name, "Annotation disabled");
        return Vec::new();
    }

    let Some(target) = hooks
        .prepare_annotation_query(annotation)
        .or_else(|| annotation.query.clone())
    else {
        tracing::debug!(annotation = %annotation.name, "Annotation has no query");
        return Vec::new();
    };

    let batch = compose(request, target);
    let request_id = batch.request_id.clone();

    let result = match dispatch(batch).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(
                annotation = %annotation.name,
                request_id = %request_id,
                error = %e,
                "Annotation query could not be built"
            );
            return Vec::new();
        }
    };

    if result.is_error() {
        tracing::warn!(
            annotation = %annotation.name,
            request_id = %request_id,
            error = ?result.error,
            "Annotation query failed"
        );
        return Vec::new();
    }

    let Some(first) = result.data.first() else {
        return Vec::new();
    };

    let mut events = hooks
        .process_annotation_events(annotation, &result)
        .unwrap_or_else(|| extract_annotation_events(first).events);

    if let Some(ref icon_color) = annotation.icon_color {
        for event in events.iter_mut().filter(|e| e.color.is_none()) {
            event.color = Some(icon_color.clone());
        }
    }

    tracing::debug!(
        annotation = %annotation.name,
        request_id = %request_id,
        events = events.len(),
        "Annotation query complete"
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::DefaultHooks;
    use crate::response::LoadingState;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;

    fn request(enable: bool, query: Option<QueryTarget>) -> AnnotationRequest {
        AnnotationRequest {
            annotation: AnnotationQuery {
                enable,
                name: "Deploys".to_string(),
                query,
                ..Default::default()
            },
            range: TimeRange::from_millis(0, 3_600_000).unwrap(),
            dashboard: DashboardInfo {
                uid: Some("dash".to_string()),
                timezone: Some("utc".to_string()),
            },
        }
    }

    fn deploy_frame() -> DataFrame {
        DataFrame::new(vec![
            Field::new("time", FieldType::Time, vec![json!(1000), json!(5000)]),
            Field::new("timeEnd", FieldType::Time, vec![json!(1000), json!(9000)]),
            Field::new("text", FieldType::String, vec![json!("v1.2"), json!("v1.3")]),
            Field::new("tags", FieldType::Other, vec![json!("deploy, prod"), json!(["deploy"])]),
            Field::new("id", FieldType::Number, vec![json!(1), json!(2)]),
        ])
        .with_ref_id("Anno")
    }

    fn frames(frames: Vec<DataFrame>) -> NormalizedResult {
        NormalizedResult {
            state: LoadingState::Done,
            data: frames,
            error: None,
        }
    }

    #[test]
    fn test_extract_events() {
        let events = extract_annotation_events(&deploy_frame()).events;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time, Some(1000));
        assert!(!events[0].is_region);
        assert_eq!(events[0].tags, vec!["deploy", "prod"]);
        assert_eq!(events[0].id.as_deref(), Some("1"));
        assert!(events[1].is_region);
        assert_eq!(events[1].text.as_deref(), Some("v1.3"));
        assert_eq!(events[1].tags, vec!["deploy"]);
    }

    #[test]
    fn test_extract_falls_back_to_time_typed_field() {
        let frame = DataFrame::new(vec![
            Field::new("Time", FieldType::Time, vec![json!("2024-01-01T00:00:00Z")]),
            Field::new("title", FieldType::String, vec![json!("Outage")]),
        ]);

        let events = extract_annotation_events(&frame).events;
        assert_eq!(events[0].time, Some(1_704_067_200_000));
        assert_eq!(events[0].title.as_deref(), Some("Outage"));
    }

    #[test]
    fn test_compose_defaults() {
        let batch = compose(&request(true, None), QueryTarget::new("Anno"));

        assert!(batch.request_id.starts_with(ANNOTATION_REQUEST_PREFIX));
        assert_eq!(batch.interval, "1m");
        assert_eq!(batch.interval_ms, Some(60_000));
        assert_eq!(batch.timezone.as_deref(), Some("utc"));
        assert!(batch.scoped_vars.is_empty());
        assert_eq!(batch.targets.len(), 1);
    }

    #[test]
    fn test_compose_uses_overrides() {
        let mut req = request(true, None);
        req.annotation.interval = Some("5m".to_string());
        req.annotation.interval_ms = Some(300_000);

        let batch = compose(&req, QueryTarget::new("Anno"));
        assert_eq!(batch.interval, "5m");
        assert_eq!(batch.interval_ms, Some(300_000));
    }

    #[tokio::test]
    async fn test_disabled_never_dispatches() {
        let calls = Cell::new(0);
        let events = translate_and_run(
            &request(false, Some(QueryTarget::new("Anno"))),
            &DefaultHooks,
            |_| async {
                calls.set(calls.get() + 1);
                Ok(NormalizedResult::empty())
            },
        )
        .await;

        assert!(events.is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn test_missing_query_never_dispatches() {
        let calls = Cell::new(0);
        let events = translate_and_run(&request(true, None), &DefaultHooks, |_| async {
            calls.set(calls.get() + 1);
            Ok(NormalizedResult::empty())
        })
        .await;

        assert!(events.is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn test_failed_result_yields_no_events() {
        let events = translate_and_run(
            &request(true, Some(QueryTarget::new("Anno"))),
            &DefaultHooks,
            |_| async {
                Ok(crate::response::decode(
                    crate::error::TransportError::network("connection refused"),
                ))
            },
        )
        .await;

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_build_error_yields_no_events() {
        let events = translate_and_run(
            &request(true, Some(QueryTarget::new("Anno"))),
            &DefaultHooks,
            |_| async { Err(QueryError::unknown_backend("Gone")) },
        )
        .await;

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_default_extraction_uses_first_frame() {
        let mut req = request(true, Some(QueryTarget::new("Anno")));
        req.annotation.icon_color = Some("#ff0000".to_string());

        let events = translate_and_run(&req, &DefaultHooks, |batch| async move {
            assert_eq!(batch.targets[0].ref_id.as_deref(), Some("Anno"));
            Ok(frames(vec![deploy_frame(), DataFrame::default()]))
        })
        .await;

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.color.as_deref() == Some("#ff0000")));
    }

    #[tokio::test]
    async fn test_zero_frames_yields_no_events() {
        let events = translate_and_run(
            &request(true, Some(QueryTarget::new("Anno"))),
            &DefaultHooks,
            |_| async { Ok(frames(Vec::new())) },
        )
        .await;

        assert!(events.is_empty());
    }

    struct CustomHooks;

    impl QueryHooks for CustomHooks {
        fn prepare_annotation_query(&self, annotation: &AnnotationQuery) -> Option<QueryTarget> {
            Some(QueryTarget::new("Prepared").with_field("expr", annotation.name.clone()))
        }

        fn process_annotation_events(
            &self,
            _annotation: &AnnotationQuery,
            result: &NormalizedResult,
        ) -> Option<Vec<AnnotationEvent>> {
            Some(vec![AnnotationEvent {
                title: Some(format!("{} frames", result.data.len())),
                ..Default::default()
            }])
        }
    }

    #[tokio::test]
    async fn test_custom_hooks() {
        let events = translate_and_run(&request(true, None), &CustomHooks, |batch| async move {
            assert_eq!(batch.targets[0].ref_id.as_deref(), Some("Prepared"));
            assert_eq!(batch.targets[0].fields["expr"], json!("Deploys"));
            Ok(frames(vec![deploy_frame(), deploy_frame()]))
        })
        .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title.as_deref(), Some("2 frames"));
    }
}
