//! Datasource Client
//!
//! The query-dispatch surface of one datasource instance.
//!
//! # Architecture
//!
//! ```text
//! BatchRequest ──> builder::build ──> dispatch ──> Transport::fetch
//!                   (resolver, hooks)     │
//!                                         └──> response::decode ──> NormalizedResult
//!
//! AnnotationRequest ──> annotations::translate_and_run ──> query (above)
//! ```
//!
//! The client holds no mutable state. Clones share the same transport, hooks
//! and settings, and concurrent calls are independent of each other.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::annotations::{self, AnnotationEvent, AnnotationRequest};
use crate::builder;
use crate::config::{InstanceSettings, RuntimeSettings};
use crate::error::{QueryError, TransportError};
use crate::health::{HealthResult, TestResult};
use crate::hooks::{DefaultHooks, QueryHooks};
use crate::query::{BatchRequest, OutboundPayload};
use crate::response::{decode, NormalizedResult};
use crate::transport::{FetchRequest, Transport};

/// Path of the batch query endpoint
pub const QUERY_ENDPOINT: &str = "/api/ds/query";

/// Query client bound to one datasource instance
#[derive(Clone)]
pub struct DataSourceClient {
    instance: Arc<InstanceSettings>,
    runtime: Arc<RuntimeSettings>,
    transport: Arc<dyn Transport>,
    hooks: Arc<dyn QueryHooks>,
}

impl fmt::Debug for DataSourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceClient")
            .field("instance", &self.instance)
            .field("org_id", &self.runtime.org_id)
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}

impl DataSourceClient {
    /// Client with the default hooks
    pub fn new(
        instance: InstanceSettings,
        runtime: RuntimeSettings,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            instance: Arc::new(instance),
            runtime: Arc::new(runtime),
            transport,
            hooks: Arc::new(DefaultHooks),
        }
    }

    /// Replace the plugin hooks
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn QueryHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Numeric id of this datasource
    #[must_use]
    pub fn id(&self) -> i64 {
        self.instance.id
    }

    /// Identity this client acts for
    #[must_use]
    pub fn instance(&self) -> &InstanceSettings {
        &self.instance
    }

    /// Runtime settings snapshot
    #[must_use]
    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Build the outbound payload without sending it
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownBackend`] if any target cannot be resolved.
    pub fn build_request(&self, request: &BatchRequest) -> Result<Option<OutboundPayload>, QueryError> {
        builder::build(request, self.instance.id, self.hooks.as_ref(), &self.runtime)
    }

    /// Build and dispatch a batch
    ///
    /// A batch that ends up with no targets completes immediately with an
    /// empty successful result and makes no call.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownBackend`] before anything is sent if any
    /// target cannot be resolved. Transport failures are reported through the
    /// returned [`NormalizedResult`] instead.
    pub async fn query(&self, request: &BatchRequest) -> Result<NormalizedResult, QueryError> {
        let Some(payload) = self.build_request(request)? else {
            tracing::debug!(request_id = %request.request_id, "Empty batch, nothing to send");
            return Ok(NormalizedResult::empty());
        };
        Ok(self.dispatch(&payload, &request.request_id).await)
    }

    /// Send a built payload to the query endpoint
    ///
    /// Makes exactly one call. Both a reply and a failure are decoded into
    /// the same [`NormalizedResult`] shape.
    pub async fn dispatch(&self, payload: &OutboundPayload, request_id: &str) -> NormalizedResult {
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                return decode(TransportError::encode(format!(
                    "Failed to encode query payload: {e}"
                )))
            }
        };

        tracing::debug!(
            request_id,
            datasource_id = self.instance.id,
            targets = payload.queries.len(),
            "Dispatching query"
        );

        let request = FetchRequest::post(QUERY_ENDPOINT, Some(body)).with_request_id(request_id);
        let result = match self.transport.fetch(request).await {
            Ok(response) => decode(response),
            Err(e) => {
                tracing::warn!(
                    request_id,
                    status = ?e.status,
                    error = %e,
                    "Query request failed"
                );
                decode(e)
            }
        };

        if let Some(ref error) = result.error {
            tracing::debug!(
                request_id,
                ref_id = ?error.ref_id,
                message = %error.message,
                "Query returned an error"
            );
        }
        result
    }

    /// Evaluate an annotation over the dashboard range
    ///
    /// Never fails; problems are logged and produce no events.
    pub async fn annotation_query(&self, request: &AnnotationRequest) -> Vec<AnnotationEvent> {
        annotations::translate_and_run(request, self.hooks.as_ref(), |batch| async move {
            self.query(&batch).await
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Resources and Health
    // ------------------------------------------------------------------------

    fn resource_url(&self, path: &str) -> String {
        format!(
            "/api/datasources/{}/resources/{}",
            self.instance.id,
            path.trim_start_matches('/')
        )
    }

    fn health_url(&self) -> String {
        format!("/api/datasources/{}/health", self.instance.id)
    }

    /// GET a plugin resource
    ///
    /// # Errors
    ///
    /// Transport errors are returned as-is.
    pub async fn get_resource(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value, TransportError> {
        self.transport.get(&self.resource_url(path), params).await
    }

    /// POST to a plugin resource
    ///
    /// # Errors
    ///
    /// Transport errors are returned as-is.
    pub async fn post_resource(&self, path: &str, body: Option<Value>) -> Result<Value, TransportError> {
        self.transport.post(&self.resource_url(path), body).await
    }

    /// Check the datasource health endpoint
    ///
    /// A failed call is read from the error body the server sent; without a
    /// body the result is an `ERROR` carrying the transport message.
    pub async fn check_health(&self) -> HealthResult {
        let request = FetchRequest::get(self.health_url()).with_error_alert(false);

        match self.transport.fetch(request).await {
            Ok(response) => HealthResult::from_value(&response.data),
            Err(e) => match e.data {
                Some(ref data) => {
                    let mut health = HealthResult::from_value(data);
                    if health.message.is_empty() {
                        health.message = e.message.clone();
                    }
                    health
                }
                None => HealthResult::error(e.to_string()),
            },
        }
    }

    /// Summarize [`check_health`](Self::check_health) as pass or fail
    pub async fn test_health(&self) -> TestResult {
        TestResult::from(self.check_health().await)
    }
}
