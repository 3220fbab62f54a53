//! Session tracking: the polling state machine over one remote job.
//!
//! States: idle → processing → completed. The tracker owns the only
//! recurring task in the system; (re)starting a session cancels the previous
//! token before installing a new one, so at most one poll loop is ever
//! alive. Transport failures during a tick are swallowed — the session keeps
//! its last known state and the loop keeps running.

use crate::{
    CURRENT_SESSION_KEY, CaptureError,
    record::{ProcessingSession, SessionStatus},
    store::StateStore,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ingest_client::StatusResponse;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Where status ticks come from. Implemented by the API client; tests plug
/// in scripted sources.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn poll_status(&self) -> Result<StatusResponse, CaptureError>;
}

#[derive(Clone)]
pub struct SessionTracker {
    inner: Arc<Inner>,
    poll_interval: Duration,
}

struct Inner {
    store: Arc<dyn StateStore>,
    source: Arc<dyn StatusSource>,
    session: Mutex<Option<ProcessingSession>>,
    poll_token: Mutex<Option<CancellationToken>>,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn StateStore>, source: Arc<dyn StatusSource>) -> Self {
        Self::with_interval(store, source, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        store: Arc<dyn StateStore>,
        source: Arc<dyn StatusSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                source,
                session: Mutex::new(None),
                poll_token: Mutex::new(None),
            }),
            poll_interval,
        }
    }

    /// Snapshot of the tracked session.
    pub fn current(&self) -> Option<ProcessingSession> {
        self.inner.session.lock().clone()
    }

    /// Begin tracking a fresh session, replacing whatever was there (a
    /// completed record or a stale processing one) and restarting the poll
    /// loop.
    pub async fn start(
        &self,
        page_url: impl Into<String>,
        manifest_url: impl Into<String>,
    ) -> Result<(), CaptureError> {
        let session = ProcessingSession::new(page_url, manifest_url);
        info!(page_url = %session.page_url, "tracking new processing session");
        *self.inner.session.lock() = Some(session);
        self.inner.persist().await?;
        self.spawn_poll();
        Ok(())
    }

    /// Re-attach polling to a persisted in-flight session after a restart.
    /// Does not call the remote API's start path — the job is already
    /// running. Returns whether anything was resumed.
    pub async fn resume(&self) -> Result<bool, CaptureError> {
        let Some(value) = self.inner.store.get(CURRENT_SESSION_KEY).await? else {
            return Ok(false);
        };
        let session: ProcessingSession = match serde_json::from_value(value) {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, "ignoring unreadable persisted session");
                return Ok(false);
            }
        };
        if !session.is_processing() {
            *self.inner.session.lock() = Some(session);
            return Ok(false);
        }
        info!(page_url = %session.page_url, "resuming persisted processing session");
        *self.inner.session.lock() = Some(session);
        self.spawn_poll();
        Ok(true)
    }

    /// Cancel local tracking only; the session record and the remote job are
    /// left untouched.
    pub fn stop(&self) {
        if let Some(token) = self.inner.poll_token.lock().take() {
            token.cancel();
        }
    }

    /// True while a poll loop is installed.
    pub fn is_polling(&self) -> bool {
        self.inner
            .poll_token
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    fn spawn_poll(&self) {
        let token = {
            let mut guard = self.inner.poll_token.lock();
            // Single-timer invariant: the old loop dies before the new one
            // is installed.
            if let Some(old) = guard.take() {
                old.cancel();
            }
            let token = CancellationToken::new();
            *guard = Some(token.clone());
            token
        };

        let inner = self.inner.clone();
        let interval = self.poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                match inner.source.poll_status().await {
                    Ok(status) => {
                        let completed = inner.apply_status(&status);
                        if let Err(e) = inner.persist().await {
                            debug!(error = %e, "failed to persist session state");
                        }
                        if completed {
                            token.cancel();
                            break;
                        }
                    }
                    Err(e) => {
                        // Stale status beats a dead tracker: keep the loop
                        // and the session exactly as they were.
                        debug!(error = %e, "status poll failed; retrying next tick");
                    }
                }
            }
        });
    }
}

impl Inner {
    /// Fold one status payload into the session. Returns true when the
    /// session just completed.
    fn apply_status(&self, status: &StatusResponse) -> bool {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return true;
        };

        let now = Utc::now();
        // Progress never goes backwards within one session; the backend can
        // momentarily report less between pipeline stages.
        session.progress = session.progress.max(status.progress.min(100));
        if let Some(step) = &status.current_step {
            session.current_step = step.clone();
        }
        session.last_updated_at = Some(now);

        let start = status
            .start_time
            .as_deref()
            .and_then(parse_server_time)
            .unwrap_or(session.started_at);
        session.elapsed_sec = (now - start).num_seconds().max(0) as u64;

        if !status.processing {
            session.status = SessionStatus::Completed;
            session.completed_at = Some(now);
            info!(page_url = %session.page_url, elapsed_sec = session.elapsed_sec, "processing session completed");
            return true;
        }
        false
    }

    async fn persist(&self) -> Result<(), CaptureError> {
        let snapshot = self.session.lock().clone();
        match snapshot {
            Some(session) => {
                self.store
                    .set(CURRENT_SESSION_KEY, serde_json::to_value(&session)?)
                    .await
            }
            None => self.store.remove(CURRENT_SESSION_KEY).await,
        }
    }
}

/// The backend reports `start_time` as ISO-8601, sometimes without a zone.
fn parse_server_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            s.parse::<NaiveDateTime>()
                .ok()
                .map(|n| Utc.from_utc_datetime(&n))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a scripted sequence of poll results, then repeats the last.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<StatusResponse, CaptureError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<StatusResponse, CaptureError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn poll_status(&self) -> Result<StatusResponse, CaptureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script.lock().pop_front().unwrap_or_else(|| {
                Ok(StatusResponse {
                    processing: false,
                    ..Default::default()
                })
            })
        }
    }

    fn processing(progress: u8) -> Result<StatusResponse, CaptureError> {
        Ok(StatusResponse {
            processing: true,
            progress,
            current_step: Some("transcribing".into()),
            start_time: None,
        })
    }

    fn done(progress: u8) -> Result<StatusResponse, CaptureError> {
        Ok(StatusResponse {
            processing: false,
            progress,
            current_step: Some("idle".into()),
            start_time: None,
        })
    }

    fn transport_error() -> Result<StatusResponse, CaptureError> {
        Err(CaptureError::Api(ingest_client::ApiError::NoHosts))
    }

    fn tracker(source: Arc<ScriptedSource>) -> (SessionTracker, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let t = SessionTracker::with_interval(store.clone(), source, Duration::from_millis(10));
        (t, store)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completes_exactly_once_and_stops_polling() {
        let source = ScriptedSource::new(vec![processing(50), done(100)]);
        let (tracker, store) = tracker(source.clone());

        tracker.start("https://site.test/watch", "https://cdn.test/v.m3u8").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let session = tracker.current().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.progress, 100);
        assert!(session.completed_at.is_some());
        assert!(!tracker.is_polling());

        // Loop is dead: call count must not grow anymore.
        let calls = source.calls();
        assert_eq!(calls, 2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.calls(), calls);

        // Completed state is persisted.
        let persisted = store.get(CURRENT_SESSION_KEY).await.unwrap().unwrap();
        assert_eq!(persisted["status"], "completed");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transport_failure_keeps_loop_and_state() {
        let source = ScriptedSource::new(vec![
            processing(30),
            transport_error(),
            transport_error(),
            transport_error(),
            transport_error(),
            done(90),
        ]);
        let (tracker, _) = tracker(source);

        tracker.start("https://site.test/watch", "m").await.unwrap();
        tokio::time::sleep(Duration::from_millis(35)).await;
        // Mid-failure the session still shows the last good state.
        let mid = tracker.current().unwrap();
        assert_eq!(mid.status, SessionStatus::Processing);
        assert_eq!(mid.progress, 30);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(tracker.current().unwrap().status, SessionStatus::Completed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn progress_is_monotonic_within_a_session() {
        let source = ScriptedSource::new(vec![processing(60), processing(40), done(0)]);
        let (tracker, _) = tracker(source);

        tracker.start("https://site.test/watch", "m").await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        let session = tracker.current().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.progress, 60);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resumes_persisted_processing_session_without_restarting() {
        let source = ScriptedSource::new(vec![done(100)]);
        let store = Arc::new(MemoryStore::default());
        let persisted = ProcessingSession::new("https://site.test/watch", "m");
        store
            .set(CURRENT_SESSION_KEY, serde_json::to_value(&persisted).unwrap())
            .await
            .unwrap();

        let tracker =
            SessionTracker::with_interval(store, source.clone(), Duration::from_millis(10));
        assert!(tracker.resume().await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(tracker.current().unwrap().status, SessionStatus::Completed);
        assert!(source.calls() >= 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completed_persisted_session_does_not_resume_polling() {
        let source = ScriptedSource::new(vec![]);
        let store = Arc::new(MemoryStore::default());
        let mut persisted = ProcessingSession::new("https://site.test/watch", "m");
        persisted.status = SessionStatus::Completed;
        store
            .set(CURRENT_SESSION_KEY, serde_json::to_value(&persisted).unwrap())
            .await
            .unwrap();

        let tracker =
            SessionTracker::with_interval(store, source.clone(), Duration::from_millis(10));
        assert!(!tracker.resume().await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(source.calls(), 0);
        // The record itself is still visible.
        assert_eq!(tracker.current().unwrap().status, SessionStatus::Completed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_cancels_tracking_but_keeps_the_record() {
        let source = ScriptedSource::new(vec![
            processing(10),
            processing(20),
            processing(30),
            processing(40),
        ]);
        let (tracker, _) = tracker(source.clone());

        tracker.start("https://site.test/watch", "m").await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        tracker.stop();
        assert!(!tracker.is_polling());
        let calls = source.calls();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(source.calls() <= calls + 1);
        let session = tracker.current().unwrap();
        assert_eq!(session.status, SessionStatus::Processing);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn new_start_replaces_previous_session() {
        let source = ScriptedSource::new(vec![processing(10), processing(20), done(100)]);
        let (tracker, store) = tracker(source);

        tracker.start("https://site.test/a", "m1").await.unwrap();
        tracker.start("https://site.test/b", "m2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let session = tracker.current().unwrap();
        assert_eq!(session.page_url, "https://site.test/b");
        let persisted = store.get(CURRENT_SESSION_KEY).await.unwrap().unwrap();
        assert_eq!(persisted["pageUrl"], "https://site.test/b");
    }

    #[test]
    fn server_start_time_parses_with_and_without_zone() {
        assert!(parse_server_time("2026-01-02T03:04:05Z").is_some());
        assert!(parse_server_time("2026-01-02T03:04:05.123456").is_some());
        assert!(parse_server_time("not a time").is_none());
    }
}
