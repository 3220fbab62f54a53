//! The capture coordinator.
//!
//! One owned object runs the whole observe → classify → normalize → gate →
//! store → deliver pipeline and holds every piece of state the background
//! process needs (debounce map, capture slot, session tracker). Collaborators
//! that live outside the core — the tab lookup and the ingest API — come in
//! through traits.

use crate::{
    CaptureError,
    debounce::{DebounceDecision, DebounceGate},
    page::{canonical_page_url, domain_of, page_is_manifest},
    record::{ManifestCapture, ObservedRequest},
    session::SessionTracker,
    store::CaptureStore,
};
use async_trait::async_trait;
use chrono::Utc;
use manifest_detect::{
    CaptureValidity, WatchList, check_validity, classify, has_path_jwt, normalize_manifest_url,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolves a tab id to the page URL currently shown in that tab. May fail
/// (tab closed, request from a worker); the capture is then silently dropped.
#[async_trait]
pub trait TabLookup: Send + Sync {
    async fn page_url(&self, tab_id: i64) -> Option<String>;
}

/// Destination of accepted, deliverable captures.
#[async_trait]
pub trait IngestSink: Send + Sync {
    async fn deliver(
        &self,
        capture: &ManifestCapture,
        auto_process: bool,
    ) -> Result<(), CaptureError>;
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub watch: WatchList,
    pub debounce_window: Duration,
    /// When set, every delivered capture immediately starts session tracking
    /// for its page and the ingest payload asks the backend to process it.
    pub auto_process: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            watch: WatchList::default(),
            debounce_window: crate::debounce::DEFAULT_DEBOUNCE_WINDOW,
            auto_process: false,
        }
    }
}

/// What happened to one observed request.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// No rule matched, the tab is gone, or the page is itself a manifest.
    Ignored,
    /// Suppressed by the debounce window.
    Debounced,
    /// Stored and forwarded (delivery itself is best-effort).
    Captured(ManifestCapture),
    /// Stored for display but not forwarded (Cloudflare without a JWT).
    RecordedUndeliverable(ManifestCapture),
}

pub struct CaptureCoordinator {
    config: CoordinatorConfig,
    gate: Mutex<DebounceGate>,
    captures: CaptureStore,
    tabs: Arc<dyn TabLookup>,
    sink: Arc<dyn IngestSink>,
    tracker: SessionTracker,
}

impl CaptureCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        captures: CaptureStore,
        tabs: Arc<dyn TabLookup>,
        sink: Arc<dyn IngestSink>,
        tracker: SessionTracker,
    ) -> Self {
        let gate = Mutex::new(DebounceGate::new(config.debounce_window));
        Self {
            config,
            gate,
            captures,
            tabs,
            sink,
            tracker,
        }
    }

    pub fn captures(&self) -> &CaptureStore {
        &self.captures
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Run one observed request through the pipeline.
    ///
    /// Nothing here is fatal: every failure path degrades to `Ignored`; the
    /// only error surfaced is a persistence failure on the capture slot.
    pub async fn observe(&self, request: &ObservedRequest) -> Result<CaptureOutcome, CaptureError> {
        if !self.config.watch.matches(&request.url) {
            return Ok(CaptureOutcome::Ignored);
        }

        let Some(hit) = classify(&request.url) else {
            return Ok(CaptureOutcome::Ignored);
        };

        let Some(page_url) = self.tabs.page_url(request.tab_id).await else {
            debug!(tab_id = request.tab_id, "tab gone; dropping capture");
            return Ok(CaptureOutcome::Ignored);
        };
        let page_url = canonical_page_url(&page_url);

        if page_is_manifest(&page_url) {
            debug!(%page_url, "page is itself a manifest; dropping capture");
            return Ok(CaptureOutcome::Ignored);
        }

        let manifest_url = normalize_manifest_url(&hit.manifest_url);
        let validity = check_validity(hit.source, &manifest_url);

        // Only the validated JWT-path form may override a stored query-form
        // manifest inside the window.
        let upgrade = validity.is_deliverable() && has_path_jwt(&manifest_url);
        let decision = self.gate.lock().admit(&page_url, &manifest_url, upgrade);
        if decision == DebounceDecision::Suppress {
            return Ok(CaptureOutcome::Debounced);
        }

        let capture = ManifestCapture {
            domain: domain_of(&page_url),
            page_url,
            manifest_url,
            source: hit.source,
            timestamp: Utc::now(),
            deliverable: validity == CaptureValidity::Deliverable,
            video_title: None,
            support_materials: vec![],
        };

        self.captures.set(&capture).await?;

        if !capture.deliverable {
            info!(source = %capture.source, page_url = %capture.page_url,
                "capture recorded but unusable (missing token)");
            return Ok(CaptureOutcome::RecordedUndeliverable(capture));
        }

        info!(source = %capture.source, page_url = %capture.page_url, "manifest captured");

        // Best-effort: a dead API never rolls back the capture slot.
        match self.sink.deliver(&capture, self.config.auto_process).await {
            Ok(()) if self.config.auto_process => {
                let started = self
                    .tracker
                    .start(capture.page_url.clone(), capture.manifest_url.clone())
                    .await;
                if let Err(e) = started {
                    warn!(error = %e, "failed to start session tracking");
                }
            }
            Ok(()) => {}
            Err(e) => warn!(error = %e, "capture delivery failed"),
        }

        Ok(CaptureOutcome::Captured(capture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StatusSource;
    use crate::store::MemoryStore;
    use ingest_client::StatusResponse;
    use rustc_hash::FxHashMap;

    struct StaticTabs(FxHashMap<i64, String>);

    #[async_trait]
    impl TabLookup for StaticTabs {
        async fn page_url(&self, tab_id: i64) -> Option<String> {
            self.0.get(&tab_id).cloned()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(ManifestCapture, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl IngestSink for RecordingSink {
        async fn deliver(
            &self,
            capture: &ManifestCapture,
            auto_process: bool,
        ) -> Result<(), CaptureError> {
            if self.fail {
                return Err(CaptureError::Api(ingest_client::ApiError::NoHosts));
            }
            self.delivered.lock().push((capture.clone(), auto_process));
            Ok(())
        }
    }

    struct IdleSource;

    #[async_trait]
    impl StatusSource for IdleSource {
        async fn poll_status(&self) -> Result<StatusResponse, CaptureError> {
            Ok(StatusResponse::default())
        }
    }

    fn coordinator(
        auto_process: bool,
        sink: Arc<RecordingSink>,
    ) -> CaptureCoordinator {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::default());
        let mut tabs = FxHashMap::default();
        tabs.insert(1, "https://school.test/lesson".to_string());
        tabs.insert(2, "https://www.youtube.com/watch?v=abc123&t=9".to_string());

        CaptureCoordinator::new(
            CoordinatorConfig {
                auto_process,
                ..Default::default()
            },
            CaptureStore::new(store.clone()),
            Arc::new(StaticTabs(tabs)),
            sink,
            SessionTracker::new(store, Arc::new(IdleSource)),
        )
    }

    fn request(url: &str, tab_id: i64) -> ObservedRequest {
        ObservedRequest {
            url: url.to_string(),
            tab_id,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn generic_hls_is_captured_stored_and_delivered() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(false, sink.clone());

        let out = c
            .observe(&request("https://cdn.example.com/vod/master.m3u8", 1))
            .await
            .unwrap();

        let CaptureOutcome::Captured(capture) = out else {
            panic!("expected capture, got {out:?}");
        };
        assert_eq!(capture.page_url, "https://school.test/lesson");
        assert_eq!(capture.domain, "school.test");
        assert!(capture.deliverable);

        assert_eq!(c.captures().get().await.unwrap().unwrap(), capture);
        let delivered = sink.delivered.lock();
        assert_eq!(delivered.len(), 1);
        assert!(!delivered[0].1);
    }

    #[tokio::test]
    async fn unwatched_and_unmatched_urls_are_ignored() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(false, sink.clone());

        // Watched host but no manifest rule.
        let out = c
            .observe(&request("https://www.youtube.com/favicon.ico", 2))
            .await
            .unwrap();
        assert_eq!(out, CaptureOutcome::Ignored);
        // Not on the watch list at all.
        let out = c
            .observe(&request("https://example.com/app.js", 1))
            .await
            .unwrap();
        assert_eq!(out, CaptureOutcome::Ignored);
        assert!(sink.delivered.lock().is_empty());
    }

    #[tokio::test]
    async fn closed_tab_drops_capture_silently() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(false, sink.clone());
        let out = c
            .observe(&request("https://cdn.example.com/vod/master.m3u8", 99))
            .await
            .unwrap();
        assert_eq!(out, CaptureOutcome::Ignored);
        assert!(c.captures().get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cloudflare_without_token_is_recorded_but_not_delivered() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(false, sink.clone());

        let out = c
            .observe(&request(
                "https://x.cloudflarestream.com/vid42/manifest/video.m3u8",
                1,
            ))
            .await
            .unwrap();

        let CaptureOutcome::RecordedUndeliverable(capture) = out else {
            panic!("expected undeliverable record, got {out:?}");
        };
        assert!(!capture.deliverable);
        // Stored for display, never forwarded.
        assert!(c.captures().get().await.unwrap().is_some());
        assert!(sink.delivered.lock().is_empty());
    }

    #[tokio::test]
    async fn duplicate_within_window_is_debounced() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(false, sink.clone());
        let req = request("https://cdn.example.com/vod/master.m3u8", 1);

        assert!(matches!(
            c.observe(&req).await.unwrap(),
            CaptureOutcome::Captured(_)
        ));
        assert_eq!(c.observe(&req).await.unwrap(), CaptureOutcome::Debounced);
        assert_eq!(sink.delivered.lock().len(), 1);
    }

    #[tokio::test]
    async fn jwt_path_upgrade_passes_the_window() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(false, sink.clone());

        // Query form with an opaque token: recorded (undeliverable), opens
        // the window with a `?p=` manifest.
        let out = c
            .observe(&request(
                "https://x.cloudflarestream.com/vid/manifest/video.m3u8?p=opaque",
                1,
            ))
            .await
            .unwrap();
        assert!(matches!(out, CaptureOutcome::RecordedUndeliverable(_)));

        // JWT query form normalizes to the path form and upgrades through.
        let out = c
            .observe(&request(
                "https://x.cloudflarestream.com/vid/manifest/video.m3u8?p=eyJa.eyJb.c2ln",
                1,
            ))
            .await
            .unwrap();
        let CaptureOutcome::Captured(capture) = out else {
            panic!("expected upgraded capture, got {out:?}");
        };
        assert_eq!(
            capture.manifest_url,
            "https://x.cloudflarestream.com/eyJa.eyJb.c2ln/manifest/video.m3u8"
        );
        assert_eq!(sink.delivered.lock().len(), 1);
    }

    #[tokio::test]
    async fn page_url_is_canonicalized_before_keying() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(false, sink.clone());

        let out = c
            .observe(&request(
                "https://r1---sn-x.googlevideo.com/videoplayback?expire=1",
                2,
            ))
            .await
            .unwrap();
        let CaptureOutcome::Captured(capture) = out else {
            panic!("expected capture, got {out:?}");
        };
        assert_eq!(capture.page_url, "https://www.youtube.com/watch?v=abc123");
    }

    #[tokio::test]
    async fn delivery_failure_keeps_the_stored_capture() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let c = coordinator(false, sink);

        let out = c
            .observe(&request("https://cdn.example.com/vod/master.m3u8", 1))
            .await
            .unwrap();
        assert!(matches!(out, CaptureOutcome::Captured(_)));
        assert!(c.captures().get().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn auto_process_starts_session_tracking() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(true, sink.clone());

        c.observe(&request("https://cdn.example.com/vod/master.m3u8", 1))
            .await
            .unwrap();

        assert!(sink.delivered.lock()[0].1, "payload must ask for auto-process");
        let session = c.tracker().current().expect("session should be tracking");
        assert_eq!(session.page_url, "https://school.test/lesson");
    }
}
