//! Shared fixtures for the client integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use dsclient_core::{
    DataSourceClient, DataSourceEntry, FetchRequest, FetchResponse, InstanceSettings,
    RuntimeSettings, Transport, TransportError,
};

pub const SELF_ID: i64 = 42;
pub const ORG_ID: i64 = 3;

/// Transport that records requests and answers from a script
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Result<Value, TransportError>>>>,
    seen: Arc<Mutex<Vec<FetchRequest>>>,
}

impl ScriptedTransport {
    pub fn reply(&self, body: Value) -> &Self {
        self.script.lock().push_back(Ok(body));
        self
    }

    pub fn fail(&self, error: TransportError) -> &Self {
        self.script.lock().push_back(Err(error));
        self
    }

    pub fn seen(&self) -> Vec<FetchRequest> {
        self.seen.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, TransportError> {
        let request_id = request.request_id.clone();
        self.seen.lock().push(request);
        let next = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"results": {}})));
        next.map(|data| FetchResponse {
            status: 200,
            status_text: "OK".to_string(),
            data,
            request_id,
        })
    }
}

pub fn runtime() -> RuntimeSettings {
    RuntimeSettings::new(ORG_ID)
        .with_datasource("Prometheus", DataSourceEntry::new(SELF_ID))
        .with_datasource("Loki", DataSourceEntry::new(9))
        .with_default("Loki")
}

pub fn client(transport: &ScriptedTransport) -> DataSourceClient {
    DataSourceClient::new(
        InstanceSettings::new(SELF_ID, "Prometheus"),
        runtime(),
        Arc::new(transport.clone()),
    )
}

/// One frame answering `ref_id` with a time and a value column
pub fn frame_reply(ref_id: &str) -> Value {
    json!({
        "results": {
            ref_id: {"frames": [{
                "schema": {"fields": [
                    {"name": "Time", "type": "time"},
                    {"name": "Value", "type": "number"}
                ]},
                "data": {"values": [[1000, 2000], [1.5, 2.5]]}
            }]}
        }
    })
}
