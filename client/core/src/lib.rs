//! dsclient Core - Query Dispatch for Dashboard Datasources
//!
//! This crate turns dashboard query batches into calls against a server's
//! datasource query API and hands back one normalized result shape, whether
//! the call succeeded or not. It has no UI and no runtime of its own: any
//! async executor can drive it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         DataSourceClient                          │
//! │                                                                   │
//! │  BatchRequest ─> Builder ─> Dispatcher ─> Transport ─> decode ─┐  │
//! │                    │                                            │  │
//! │                 Resolver ◄── RuntimeSettings                    │  │
//! │                    │                                            │  │
//! │                 QueryHooks (filter, template variables)         │  │
//! │                                                                 ▼  │
//! │  AnnotationRequest ─> Translator ─> (query) ─> events    NormalizedResult
//! │                                                                   │
//! │  get_resource / post_resource / check_health / test_health        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`DataSourceClient`]: the query surface of one datasource instance
//! - [`BatchRequest`] / [`QueryTarget`]: what callers send
//! - [`NormalizedResult`]: what callers get back, success or failure
//! - [`QueryHooks`]: plugin extension points injected at construction
//! - [`Transport`]: the outbound call primitive ([`HttpTransport`] by default)
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use dsclient_core::{
//!     load_config, BatchRequest, DataSourceClient, HttpTransport, QueryTarget,
//! };
//!
//! let config = load_config()?;
//! let transport = HttpTransport::new(&config.client)?.with_org_id(config.runtime.org_id);
//! let client = DataSourceClient::new(config.instance, config.runtime, Arc::new(transport));
//!
//! let request = BatchRequest::new(vec![QueryTarget::new("A").with_field("expr", "up")]);
//! let result = client.query(&request).await?;
//! if result.is_error() {
//!     eprintln!("{:?}", result.error);
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`annotations`]: annotation requests, events and the translator
//! - [`builder`]: batch to outbound payload
//! - [`client`]: [`DataSourceClient`]
//! - [`config`]: TOML configuration, runtime settings
//! - [`error`]: error types
//! - [`health`]: health check results
//! - [`hooks`]: plugin extension points
//! - [`query`]: request and payload types
//! - [`resolver`]: backend reference resolution
//! - [`response`]: frames and result normalization
//! - [`template`]: template variable interpolation
//! - [`transport`]: outbound call abstraction and the HTTP transport

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod annotations;
pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod hooks;
pub mod query;
pub mod resolver;
pub mod response;
pub mod template;
pub mod transport;

#[cfg(test)]
pub mod test_utils;

// Re-exports for convenience
pub use annotations::{
    extract_annotation_events, AnnotationEvent, AnnotationEvents, AnnotationQuery,
    AnnotationRequest, DashboardInfo,
};
pub use client::{DataSourceClient, QUERY_ENDPOINT};
pub use error::{QueryError, TransportError, TransportErrorKind};
pub use health::{HealthResult, HealthStatus, TestResult, TestStatus};
pub use hooks::{DefaultHooks, QueryHooks};
pub use query::{
    BackendRef, BatchRequest, OutboundPayload, PayloadQuery, QueryTarget, RawTimeRange, ScopedVar,
    ScopedVars, TimeRange, DEFAULT_DATASOURCE, EXPRESSION_DATASOURCE,
};
pub use resolver::{resolve, Resolution};
pub use response::{
    decode, DataFrame, DataQueryError, Field, FieldType, LoadingState, NormalizedResult, RawReply,
};
pub use template::{interpolate, TemplateHooks};
pub use transport::{FetchRequest, FetchResponse, HttpTransport, Method, Transport};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfigFile, ClientSettings,
    ConfigError, ConfigOverrides, ConfigSource, DataSourceEntry, InstanceSettings,
    RuntimeSettings,
};
