//! Typed bindings for the pipeline API endpoints.
//!
//! Field naming mirrors the backend exactly: the capture/process bodies are
//! camelCase (with the historical `prompt_template` exception), the status
//! payload is snake_case.

use crate::error::ApiError;
use crate::multi_host::MultiHostClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Body of `POST /api/capture-manifest`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureManifestRequest {
    pub page_url: String,
    pub manifest_url: String,
    pub timestamp: DateTime<Utc>,
    pub domain: String,
    pub source: String,
    pub auto_process: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub support_materials: Vec<String>,
}

/// Body of `POST /api/process`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,
    #[serde(rename = "prompt_template", skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub support_materials: Vec<String>,
}

/// Distinguishable outcomes of a process trigger. `AlreadyInProgress` is not
/// a failure: the caller switches into observing the existing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Started { total: u64 },
    Queued { position: Option<u32> },
    AlreadyInProgress,
}

#[derive(Debug, Deserialize)]
struct ProcessResponseRaw {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    added_to_queue: Option<bool>,
    #[serde(default)]
    queue_position: Option<u32>,
}

/// Payload of `GET /api/status`. The endpoint is global: it describes the one
/// job the pipeline may be running, not a per-session resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub processing: bool,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub current_step: Option<String>,
    /// Server-side job start, ISO-8601; preferred over the locally stamped
    /// start when computing elapsed time.
    #[serde(default)]
    pub start_time: Option<String>,
}

/// One entry of `GET /api/reports`. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub report_url: Option<String>,
}

/// Typed facade over [`MultiHostClient`] for the pipeline endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: MultiHostClient,
}

impl ApiClient {
    pub fn new(transport: MultiHostClient) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &MultiHostClient {
        &self.transport
    }

    /// Deliver a capture. Best-effort: the caller logs and forgets failures.
    pub async fn capture_manifest(&self, req: &CaptureManifestRequest) -> Result<(), ApiError> {
        let resp = self.transport.post_json("/api/capture-manifest", req).await?;
        if !resp.status().is_success() {
            return Err(ApiError::HttpStatus {
                status: resp.status(),
                operation: "capture-manifest",
            });
        }
        debug!(page_url = %req.page_url, "capture delivered");
        Ok(())
    }

    /// Trigger remote processing for one or more page URLs.
    pub async fn start_process(&self, req: &ProcessRequest) -> Result<ProcessOutcome, ApiError> {
        let resp = self.transport.post_json("/api/process", req).await?;
        if !resp.status().is_success() {
            return Err(ApiError::HttpStatus {
                status: resp.status(),
                operation: "process",
            });
        }
        let raw: ProcessResponseRaw = serde_json::from_str(&resp.text().await?)?;
        if raw.status.as_deref() == Some("already_in_progress") {
            return Ok(ProcessOutcome::AlreadyInProgress);
        }
        if raw.added_to_queue == Some(true) {
            return Ok(ProcessOutcome::Queued {
                position: raw.queue_position,
            });
        }
        Ok(ProcessOutcome::Started {
            total: raw.total.unwrap_or(0),
        })
    }

    pub async fn status(&self) -> Result<StatusResponse, ApiError> {
        let resp = self.transport.get("/api/status").await?;
        if !resp.status().is_success() {
            return Err(ApiError::HttpStatus {
                status: resp.status(),
                operation: "status",
            });
        }
        Ok(serde_json::from_str(&resp.text().await?)?)
    }

    pub async fn reports(&self) -> Result<Vec<ReportSummary>, ApiError> {
        let resp = self.transport.get("/api/reports").await?;
        if !resp.status().is_success() {
            return Err(ApiError::HttpStatus {
                status: resp.status(),
                operation: "reports",
            });
        }
        Ok(serde_json::from_str(&resp.text().await?)?)
    }
}
