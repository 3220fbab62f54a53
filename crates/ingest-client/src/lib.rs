//! # Ingest Client
//!
//! HTTP surface for the external processing pipeline: a [`MultiHostClient`]
//! that walks an ordered list of equivalent base hosts, and [`ApiClient`]
//! with typed bindings for the capture/process/status/reports endpoints.
//!
//! Delivery is best-effort by design: callers own retry cadence, this crate
//! only owns the single pass over the host list.

pub mod api;
pub mod error;
pub mod multi_host;

pub use api::{
    ApiClient, CaptureManifestRequest, ProcessOutcome, ProcessRequest, ReportSummary,
    StatusResponse,
};
pub use error::ApiError;
pub use multi_host::MultiHostClient;

/// Default equivalent endpoints of the local pipeline API.
pub const DEFAULT_HOSTS: &[&str] = &["http://localhost:5000", "http://127.0.0.1:5000"];
