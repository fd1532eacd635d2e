//! Query Hooks
//!
//! Extension points a datasource plugin can override. The client holds an
//! `Arc<dyn QueryHooks>`; every method has a default, so an implementation
//! only overrides what it needs.

use crate::annotations::{AnnotationEvent, AnnotationQuery};
use crate::query::{QueryTarget, ScopedVars};
use crate::response::NormalizedResult;

/// Plugin capabilities consulted while building and post-processing queries
pub trait QueryHooks: Send + Sync {
    /// Keep or drop a target before it is built. Dropping is silent.
    fn filter_query(&self, target: &QueryTarget) -> bool {
        let _ = target;
        true
    }

    /// Substitute variables into a target
    ///
    /// Must return a new target and leave the input untouched. Never called
    /// for expression targets.
    fn apply_template_variables(&self, target: &QueryTarget, scoped_vars: &ScopedVars) -> QueryTarget {
        let _ = scoped_vars;
        target.clone()
    }

    /// Turn an annotation definition into a query target
    ///
    /// `None` falls back to the annotation's inline query.
    fn prepare_annotation_query(&self, annotation: &AnnotationQuery) -> Option<QueryTarget> {
        let _ = annotation;
        None
    }

    /// Custom conversion of an annotation result into events
    ///
    /// Only called when the result holds at least one frame. `None` falls
    /// back to extracting events from the first frame.
    fn process_annotation_events(
        &self,
        annotation: &AnnotationQuery,
        result: &NormalizedResult,
    ) -> Option<Vec<AnnotationEvent>> {
        let _ = (annotation, result);
        None
    }
}

/// Hooks with every default in place
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHooks;

impl QueryHooks for DefaultHooks {}
