//! # Capture Core
//!
//! The stateful half of the manifest sniffer: everything that was once
//! free-floating background-process state lives here as owned objects.
//!
//! - [`DebounceGate`] suppresses duplicate captures per page within a window;
//! - [`CaptureStore`] persists the single most recent capture;
//! - [`SessionTracker`] drives the poll loop over one remote processing job;
//! - [`CaptureCoordinator`] owns all of the above and runs the
//!   observe → classify → normalize → gate → store → deliver pipeline.
//!
//! External collaborators (request feed, tab lookup, ingest API) enter
//! through traits so the engine is deterministic under test.

pub mod coordinator;
pub mod debounce;
pub mod page;
pub mod record;
pub mod remote;
pub mod session;
pub mod store;

mod error;

pub use coordinator::{CaptureCoordinator, CaptureOutcome, CoordinatorConfig, IngestSink, TabLookup};
pub use debounce::{DebounceDecision, DebounceGate};
pub use error::CaptureError;
pub use record::{ManifestCapture, ObservedRequest, ProcessingSession, SessionStatus};
pub use session::{SessionTracker, StatusSource};
pub use store::{CaptureStore, JsonFileStore, MemoryStore, StateStore};

/// Persisted key holding the most recent accepted capture.
pub const LAST_MANIFEST_KEY: &str = "lastManifest";
/// Persisted key holding the in-flight processing session, if any.
pub const CURRENT_SESSION_KEY: &str = "currentSession";
