//! Query Request Builder
//!
//! Turns a [`BatchRequest`] into the body of one call to the query endpoint.
//!
//! For each target, in order:
//! 1. drop it if [`QueryHooks::filter_query`] says so;
//! 2. resolve its backend reference (any failure aborts the batch);
//! 3. expression targets pass through with only `datasourceId` and `orgId`;
//! 4. other targets go through [`QueryHooks::apply_template_variables`] and
//!    get `datasourceId`, `intervalMs`, `maxDataPoints` and `orgId`.
//!
//! An empty result is reported as `Ok(None)`; no call should be made.

use crate::config::RuntimeSettings;
use crate::error::QueryError;
use crate::hooks::QueryHooks;
use crate::query::{BatchRequest, OutboundPayload, PayloadQuery, QueryTarget, RESERVED_QUERY_KEYS};
use crate::resolver::{resolve, Resolution};

/// Build the outbound payload for `request`
///
/// # Errors
///
/// Returns [`QueryError::UnknownBackend`] for the first target whose
/// reference cannot be resolved.
pub fn build(
    request: &BatchRequest,
    self_id: i64,
    hooks: &dyn QueryHooks,
    settings: &RuntimeSettings,
) -> Result<Option<OutboundPayload>, QueryError> {
    let queries = request
        .targets
        .iter()
        .filter(|target| hooks.filter_query(target))
        .map(|target| annotate(target, request, self_id, hooks, settings))
        .collect::<Result<Vec<_>, _>>()?;

    if queries.is_empty() {
        return Ok(None);
    }

    let payload = OutboundPayload::new(queries);
    Ok(Some(match request.range {
        Some(ref range) => payload.with_range(range),
        None => payload,
    }))
}

fn annotate(
    target: &QueryTarget,
    request: &BatchRequest,
    self_id: i64,
    hooks: &dyn QueryHooks,
    settings: &RuntimeSettings,
) -> Result<PayloadQuery, QueryError> {
    let resolution = resolve(target.datasource.as_ref(), self_id, settings)?;

    let query = match resolution {
        Resolution::Expression { datasource_id } => PayloadQuery {
            target: strip_reserved(target.clone()),
            datasource_id,
            org_id: settings.org_id,
            interval_ms: None,
            max_data_points: None,
        },
        Resolution::Datasource { datasource_id } => PayloadQuery {
            target: strip_reserved(hooks.apply_template_variables(target, &request.scoped_vars)),
            datasource_id,
            org_id: settings.org_id,
            interval_ms: request.interval_ms,
            max_data_points: request.max_data_points,
        },
    };
    Ok(query)
}

/// Remove caller-supplied copies of the keys the builder sets
fn strip_reserved(mut target: QueryTarget) -> QueryTarget {
    for key in RESERVED_QUERY_KEYS {
        target.fields.remove(key);
    }
    target
}
