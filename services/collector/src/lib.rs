//! Collector - Fetches KRM report data from its external origins
//!
//! Responsibilities:
//! - Resolve report objects through the backend's pre-signed URLs
//! - Download the public validatielijst
//! - Normalize fetched CSV with `krm_parser`
//! - Translate fetch failures into user-facing messages
//! - Resolve and cache viewer links for KRM criteria

pub mod config;
pub mod error;
pub mod source;
pub mod viewer;

pub use config::CollectorConfig;
pub use error::{FetchError, SourceError};
pub use source::{fallback_records, ApiProbe, CsvSource};
pub use viewer::{clean_criterium, PublicationStatus, ViewerLink, ViewerResolver, ViewerUrlCache};
