//! # Manifest Detect
//!
//! Pure classification layer for streaming-video manifest URLs.
//!
//! Given a request URL observed on the wire, this crate decides whether it
//! reveals an HLS/DASH manifest, which platform produced it, and what the
//! canonical manifest URL is. No I/O happens here; everything is a pure
//! function over strings so the rule cascade can be tested in isolation.

pub mod classifier;
pub mod normalize;
pub mod patterns;
pub mod validity;

mod source;

pub use classifier::{ClassifiedManifest, classify};
pub use normalize::normalize_manifest_url;
pub use patterns::WatchList;
pub use source::ManifestSource;
pub use validity::{CaptureValidity, check_validity, has_path_jwt, has_query_jwt, is_jwt_shaped};
