//! Probe Commands
//!
//! One function per subcommand. Each returns the JSON to print and whether
//! the call counts as a success for the exit status.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use dsclient_core::{
    AnnotationEvents, AnnotationRequest, BatchRequest, DataSourceClient, TestStatus,
};

use crate::Command;

/// Result of one subcommand
#[derive(Debug)]
pub struct Outcome {
    /// JSON printed to stdout
    pub body: Value,
    /// Whether the call succeeded
    pub success: bool,
}

impl Outcome {
    fn ok(body: Value) -> Self {
        Self {
            body,
            success: true,
        }
    }
}

/// Run `command` against `client`
pub async fn run(client: &DataSourceClient, command: &Command) -> Result<Outcome> {
    match command {
        Command::Health => {
            let health = client.check_health().await;
            Ok(Outcome {
                success: health.is_ok(),
                body: serde_json::to_value(health)?,
            })
        }
        Command::Test => {
            let result = client.test_health().await;
            Ok(Outcome {
                success: result.status == TestStatus::Success,
                body: serde_json::to_value(result)?,
            })
        }
        Command::Query { file } => {
            let request: BatchRequest = read_json(file).await?;
            debug!(
                request_id = %request.request_id,
                targets = request.targets.len(),
                "Running query batch"
            );
            let result = client.query(&request).await?;
            Ok(Outcome {
                success: !result.is_error(),
                body: serde_json::to_value(result)?,
            })
        }
        Command::Annotations { file } => {
            let request: AnnotationRequest = read_json(file).await?;
            let events = client.annotation_query(&request).await;
            Ok(Outcome::ok(serde_json::to_value(AnnotationEvents { events })?))
        }
        Command::Resource { path, params, post } => {
            let body = match post {
                Some(body_file) => {
                    let body: Value = read_json(body_file).await?;
                    client.post_resource(path, Some(body)).await
                }
                None => client.get_resource(path, params).await,
            }
            .with_context(|| format!("Resource request failed: {path}"))?;
            Ok(Outcome::ok(body))
        }
    }
}

/// Read and parse a JSON file
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}
