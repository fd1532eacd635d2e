//! Test Utilities
//!
//! Recording mock transport for exercising the client without a server.
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.push_ok(json!({"results": {}}));
//!
//! // ... run the client ...
//!
//! assert_eq!(transport.call_count(), 1);
//! assert_eq!(transport.requests()[0].url, "/api/ds/query");
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::TransportError;
use crate::transport::{FetchRequest, FetchResponse, Transport};

/// Mock transport answering from a queue of canned replies
///
/// When the queue is empty every call succeeds with `{"results": {}}`.
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<Result<Value, TransportError>>>>,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
}

impl MockTransport {
    /// Create a mock with no canned replies
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn push_ok(&self, body: Value) {
        self.replies.lock().push_back(Ok(body));
    }

    /// Queue a failure
    pub fn push_err(&self, error: TransportError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Copies of every request received
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    /// Body of the most recent request
    pub fn last_body(&self) -> Option<Value> {
        self.requests.lock().last().and_then(|r| r.data.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, TransportError> {
        let request_id = request.request_id.clone();
        self.requests.lock().push(request);

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(serde_json::json!({"results": {}})));

        reply.map(|data| FetchResponse {
            status: 200,
            status_text: "OK".to_string(),
            data,
            request_id,
        })
    }
}
