//! Wiring of the real API client into the engine's trait seams.

use crate::{
    CaptureError,
    coordinator::IngestSink,
    record::ManifestCapture,
    session::StatusSource,
};
use async_trait::async_trait;
use ingest_client::{ApiClient, CaptureManifestRequest, StatusResponse};

#[async_trait]
impl IngestSink for ApiClient {
    async fn deliver(
        &self,
        capture: &ManifestCapture,
        auto_process: bool,
    ) -> Result<(), CaptureError> {
        let req = CaptureManifestRequest {
            page_url: capture.page_url.clone(),
            manifest_url: capture.manifest_url.clone(),
            timestamp: capture.timestamp,
            domain: capture.domain.clone(),
            source: capture.source.to_string(),
            auto_process,
            video_title: capture.video_title.clone(),
            support_materials: capture.support_materials.clone(),
        };
        self.capture_manifest(&req).await?;
        Ok(())
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn poll_status(&self) -> Result<StatusResponse, CaptureError> {
        Ok(self.status().await?)
    }
}
