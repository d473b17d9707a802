//! Tag-driven bundling: look up records, stage their objects, pack them into
//! one ZIP archive, publish it and hand back a time-limited access URL.
//!
//! ```no_run
//! # async fn demo(
//! #     index: std::sync::Arc<dyn lookup_index::LookupIndex>,
//! #     store: std::sync::Arc<dyn blob_store::BlobStore>,
//! # ) {
//! use bundler::{BundlerConfig, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(index, store, BundlerConfig::default());
//! let outcome = orchestrator.run("invoice-2024").await;
//! if let Some(url) = outcome.url() {
//!     println!("{}", url);
//! }
//! # }
//! ```

pub mod archive;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod publish;
pub mod staging;

#[cfg(test)]
mod testing;

pub use archive::{artifact_name, Artifact};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::BundlerConfig;
pub use error::{BundleError, BundleResult};
pub use orchestrator::{Lookup, Orchestrator, RunRequest};
pub use staging::{StagedBlob, StagingArea};
