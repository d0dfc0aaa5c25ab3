// src/engine/submit.rs
use std::path::PathBuf;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{info, debug, warn};
use uuid::Uuid;

use super::manifest::WorkflowManifest;
use super::workflow::TaskGraph;
use crate::config::BackendSettings;
use crate::error::{FlowResult, FlowError};
use crate::utils::http::{HttpClient, is_unreachable};

/// Handle to a submitted workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowHandle {
    pub id: String,
    pub name: String,
    pub submitted_at: DateTime<Utc>,
}

/// Execution backend that accepts a workflow manifest
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn submit(&self, manifest: &WorkflowManifest) -> FlowResult<WorkflowHandle>;
}

/// Hands a finished graph to the backend, once
pub struct WorkflowSubmitter {
    backend: Arc<dyn WorkflowBackend>,
}

impl WorkflowSubmitter {
    pub fn new(backend: Arc<dyn WorkflowBackend>) -> Self {
        Self { backend }
    }

    /// Serialize and submit. Rejections are returned to the caller without retrying.
    pub async fn submit(&self, graph: TaskGraph) -> FlowResult<WorkflowHandle> {
        let manifest = WorkflowManifest::from_graph(&graph)?;
        info!(
            "Submitting workflow {} ({} steps, {} training invocations)",
            manifest.name,
            manifest.steps.len(),
            graph.training().invocations()
        );

        let handle = self.backend.submit(&manifest).await?;
        info!("Workflow {} submitted as {}", handle.name, handle.id);
        Ok(handle)
    }
}

/// Backend reached over its HTTP API
pub struct HttpBackend {
    client: HttpClient,
    url: String,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    workflow: &'a WorkflowManifest,
}

#[derive(Deserialize)]
struct SubmitResponse {
    metadata: ResponseMetadata,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    name: String,
    #[serde(default)]
    uid: Option<String>,
}

impl HttpBackend {
    pub fn new(settings: &BackendSettings) -> FlowResult<Self> {
        let base = url::Url::parse(&settings.endpoint)
            .map_err(|e| FlowError::ConfigError(format!("Invalid backend endpoint {}: {}", settings.endpoint, e)))?;
        let url = format!(
            "{}/api/v1/workflows/{}",
            base.as_str().trim_end_matches('/'),
            settings.namespace
        );

        let client = HttpClient::new(settings.timeout_seconds, settings.token.clone())
            .map_err(|e| FlowError::SubmissionError(e.to_string()))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WorkflowBackend for HttpBackend {
    async fn submit(&self, manifest: &WorkflowManifest) -> FlowResult<WorkflowHandle> {
        let response = self.client.post_json(&self.url, &SubmitRequest { workflow: manifest }).await
            .map_err(|e| {
                if is_unreachable(&e) {
                    FlowError::SubmissionError(format!("Backend unreachable at {}: {:#}", self.url, e))
                } else {
                    FlowError::SubmissionError(format!("{:#}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await
            .map_err(|e| FlowError::SubmissionError(format!("Failed to read backend response: {}", e)))?;

        if !status.is_success() {
            warn!("Backend rejected workflow {} with status {}", manifest.name, status);
            return Err(FlowError::SubmissionError(format!(
                "Backend rejected workflow with status {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)
            .map_err(|e| FlowError::SubmissionError(format!("Unreadable backend response: {}", e)))?;
        debug!("Backend accepted workflow as {}", parsed.metadata.name);

        Ok(WorkflowHandle {
            id: parsed.metadata.uid.unwrap_or_else(|| parsed.metadata.name.clone()),
            name: parsed.metadata.name,
            submitted_at: Utc::now(),
        })
    }
}

/// Writes the manifest instead of submitting it
pub struct DryRunBackend {
    output: Option<PathBuf>,
}

impl DryRunBackend {
    /// `output` of `None` prints the manifest to stdout
    pub fn new(output: Option<PathBuf>) -> Self {
        Self { output }
    }
}

#[async_trait]
impl WorkflowBackend for DryRunBackend {
    async fn submit(&self, manifest: &WorkflowManifest) -> FlowResult<WorkflowHandle> {
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| FlowError::SerializationError(format!("Failed to serialize manifest: {}", e)))?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, json).await
                    .map_err(|e| FlowError::FileError {
                        path: path.clone(),
                        message: format!("Failed to write manifest: {}", e),
                    })?;
                info!("Manifest written to {}", path.display());
            }
            None => println!("{}", json),
        }

        Ok(WorkflowHandle {
            id: format!("dry-run-{}", Uuid::new_v4()),
            name: manifest.name.clone(),
            submitted_at: Utc::now(),
        })
    }
}
