//! Duplicate-capture suppression.
//!
//! A playing video fires the same manifest request every few seconds, so a
//! capture for a page URL opens a cooldown window during which further
//! captures for that page are dropped. One asymmetric exception exists: when
//! the stored manifest used the short-lived `?p=` query-token form and the
//! new candidate is a validated JWT-path manifest, the upgrade is allowed
//! through the window. There is no symmetric path→query case.

use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    Accept,
    Suppress,
}

#[derive(Debug)]
struct KeyState {
    last_capture_time: Instant,
    last_manifest_url: String,
}

/// Per-page-URL debounce state. Not internally synchronized; the coordinator
/// holds it behind one lock so each observation is atomic.
#[derive(Debug)]
pub struct DebounceGate {
    window: Duration,
    keys: FxHashMap<String, KeyState>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            keys: FxHashMap::default(),
        }
    }

    /// Decide whether a capture for `page_url` may proceed now.
    ///
    /// `jwt_path_upgrade` marks candidates in the validated JWT-path form;
    /// only those may override a stored query-form manifest inside the
    /// window. Acceptance records the new time and manifest URL for the key.
    pub fn admit(
        &mut self,
        page_url: &str,
        manifest_url: &str,
        jwt_path_upgrade: bool,
    ) -> DebounceDecision {
        self.admit_at(Instant::now(), page_url, manifest_url, jwt_path_upgrade)
    }

    fn admit_at(
        &mut self,
        now: Instant,
        page_url: &str,
        manifest_url: &str,
        jwt_path_upgrade: bool,
    ) -> DebounceDecision {
        if let Some(state) = self.keys.get(page_url)
            && now.duration_since(state.last_capture_time) < self.window
        {
            let previous_is_query_form = state.last_manifest_url.contains("?p=");
            if !(jwt_path_upgrade && previous_is_query_form) {
                debug!(page_url, "suppressing duplicate capture inside debounce window");
                return DebounceDecision::Suppress;
            }
            debug!(page_url, "allowing query-token to JWT-path upgrade inside window");
        }

        self.keys.insert(
            page_url.to_string(),
            KeyState {
                last_capture_time: now,
                last_manifest_url: manifest_url.to_string(),
            },
        );
        DebounceDecision::Accept
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}
