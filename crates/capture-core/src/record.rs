//! Persisted data model.
//!
//! Field names serialize in camelCase: the JSON shapes double as the wire
//! format of the ingest payload and stay readable next to the backend's own
//! records.

use chrono::{DateTime, Utc};
use manifest_detect::ManifestSource;
use serde::{Deserialize, Serialize};

/// One network event from the request-observation feed. Ephemeral: consumed
/// once by the coordinator and never stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedRequest {
    pub url: String,
    /// Host-assigned tab identifier; `-1` marks requests without an owning
    /// tab (service workers and the like).
    pub tab_id: i64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// The single retained capture (latest wins). Survives restarts until
/// explicitly cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCapture {
    pub page_url: String,
    pub manifest_url: String,
    pub domain: String,
    pub source: ManifestSource,
    pub timestamp: DateTime<Utc>,
    /// False for captures recorded only for display (e.g. a Cloudflare
    /// manifest without any JWT); those are never forwarded to the API.
    #[serde(default)]
    pub deliverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub support_materials: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Processing,
    Completed,
}

/// One tracked remote processing job. At most one exists at a time; only the
/// [`SessionTracker`](crate::SessionTracker) mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSession {
    pub page_url: String,
    pub manifest_url: String,
    pub status: SessionStatus,
    pub progress: u8,
    pub current_step: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub elapsed_sec: u64,
}

impl ProcessingSession {
    pub fn new(page_url: impl Into<String>, manifest_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            manifest_url: manifest_url.into(),
            status: SessionStatus::Processing,
            progress: 0,
            current_step: "processing".to_string(),
            started_at: Utc::now(),
            last_updated_at: None,
            completed_at: None,
            elapsed_sec: 0,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.status == SessionStatus::Processing
    }
}
