//! Transport Layer
//!
//! Outbound call abstraction consumed by the query client.
//!
//! # Available Transports
//!
//! - **HTTP**: `reqwest` against a server base URL (default)
//!
//! Tests substitute their own [`Transport`] implementations.

mod http;
mod traits;

pub use http::{HttpTransport, ORG_ID_HEADER, REQUEST_ID_HEADER};
pub use traits::{FetchRequest, FetchResponse, Method, Transport};
