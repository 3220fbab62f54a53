//! NDJSON event feed: the CLI's stand-in for the browser's request
//! observation and tab lookup collaborators.

use async_trait::async_trait;
use capture_core::{ObservedRequest, TabLookup};
use chrono::Utc;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;

/// One feed line. Tab events maintain the tab-id → page-URL registry;
/// request events run through the capture pipeline.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeedEvent {
    #[serde(rename_all = "camelCase")]
    Tab {
        tab_id: i64,
        /// `null` marks the tab as closed.
        page_url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Request { tab_id: i64, url: String },
}

/// Tab-id → page-URL registry fed by tab events. Lookup of an unknown or
/// closed tab returns `None`, which drops the capture silently.
#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: Mutex<FxHashMap<i64, String>>,
}

impl TabRegistry {
    pub fn update(&self, tab_id: i64, page_url: Option<String>) {
        let mut tabs = self.tabs.lock();
        match page_url {
            Some(url) => {
                tabs.insert(tab_id, url);
            }
            None => {
                tabs.remove(&tab_id);
            }
        }
    }
}

#[async_trait]
impl TabLookup for TabRegistry {
    async fn page_url(&self, tab_id: i64) -> Option<String> {
        self.tabs.lock().get(&tab_id).cloned()
    }
}

impl FeedEvent {
    /// Convert a request event into the pipeline's input type.
    pub fn into_observed(self) -> Option<ObservedRequest> {
        match self {
            FeedEvent::Request { tab_id, url } => Some(ObservedRequest {
                url,
                tab_id,
                timestamp: Utc::now(),
            }),
            FeedEvent::Tab { .. } => None,
        }
    }
}
