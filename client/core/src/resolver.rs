//! Backend Identity Resolution
//!
//! Maps a target's backend reference to the numeric datasource id the query
//! endpoint expects. Pure lookups against the injected [`RuntimeSettings`].

use crate::config::RuntimeSettings;
use crate::error::QueryError;
use crate::query::{BackendRef, DEFAULT_DATASOURCE, EXPRESSION_DATASOURCE};

/// Outcome of resolving one reference
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Server-side expression; runs under the client's own id and skips
    /// variable substitution
    Expression {
        /// The client's own datasource id
        datasource_id: i64,
    },
    /// Regular datasource query
    Datasource {
        /// Resolved datasource id
        datasource_id: i64,
    },
}

impl Resolution {
    /// The resolved id, whichever kind
    #[must_use]
    pub fn datasource_id(&self) -> i64 {
        match self {
            Self::Expression { datasource_id } | Self::Datasource { datasource_id } => {
                *datasource_id
            }
        }
    }

    /// Whether the target is an expression
    #[must_use]
    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Expression { .. })
    }
}

/// Resolve `reference` for a client whose own id is `self_id`
///
/// # Errors
///
/// Returns [`QueryError::UnknownBackend`] when a name (or the configured
/// default name) is missing from the table, or an explicit id matches
/// neither `self_id` nor any table entry.
pub fn resolve(
    reference: Option<&BackendRef>,
    self_id: i64,
    settings: &RuntimeSettings,
) -> Result<Resolution, QueryError> {
    let Some(reference) = reference else {
        return Ok(Resolution::Datasource {
            datasource_id: self_id,
        });
    };

    match reference {
        BackendRef::Name(name) if name == EXPRESSION_DATASOURCE => Ok(Resolution::Expression {
            datasource_id: self_id,
        }),
        BackendRef::Name(name) if name == DEFAULT_DATASOURCE => {
            let default_name = settings
                .default_datasource
                .as_deref()
                .ok_or_else(|| QueryError::unknown_backend(DEFAULT_DATASOURCE))?;
            lookup(default_name, settings, reference)
        }
        BackendRef::Name(name) => lookup(name, settings, reference),
        BackendRef::Id(id) if *id == self_id || settings.contains_id(*id) => {
            Ok(Resolution::Datasource { datasource_id: *id })
        }
        BackendRef::Id(_) => Err(QueryError::unknown_backend(reference.to_string())),
    }
}

fn lookup(
    name: &str,
    settings: &RuntimeSettings,
    reference: &BackendRef,
) -> Result<Resolution, QueryError> {
    settings
        .datasource(name)
        .map(|entry| Resolution::Datasource {
            datasource_id: entry.id,
        })
        .ok_or_else(|| QueryError::unknown_backend(reference.to_string()))
}
