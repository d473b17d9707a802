//! Object store client used by the bundler.
//!
//! This crate provides the small slice of blob storage the bundling pipeline
//! needs:
//!
//! - Fetching whole objects by URI or by key relative to a storage root
//! - Uploading finished artifacts
//! - Existence checks
//! - Minting presigned GET URLs that grant temporary read access
//!
//! # Architecture
//!
//! Every backend implements the [`BlobStore`] trait. The
//! [`BlobStoreDispatcher`] routes operations to the backend matching the URI
//! scheme (`file://`, `s3://`) and resolves bare object keys against the
//! configured storage root.
//!
//! # Usage
//!
//! ```rust,no_run
//! use blob_store::{BlobStore, BlobStoreDispatcher, BlobStorageConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), blob_store::BlobError> {
//! let config = BlobStorageConfig {
//!     path: "s3://my-bucket/files".to_string(),
//!     region: Some("us-west-2".to_string()),
//! };
//! let store = BlobStoreDispatcher::new(config).await?;
//!
//! let uri = store.resolve("invoices/a.pdf")?;
//! let data = store.get(&uri).await?;
//! store.upload(&store.resolve("bundles/a.zip")?, data).await?;
//! let url = store
//!     .presign_get_uri(&store.resolve("bundles/a.zip")?, Duration::from_secs(3600))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod backends;
mod config;
mod dispatcher;
mod error;
mod metadata;
mod metrics;
mod presign;
mod traits;

pub use backends::local::LocalBlobStore;
#[cfg(feature = "aws")]
pub use backends::s3::S3BlobStore;
pub use config::{default_blob_store_path, BlobStorageConfig};
pub use dispatcher::BlobStoreDispatcher;
pub use error::{BlobError, BlobResult};
pub use metadata::BlobMetadata;
pub use metrics::{BlobMetrics, Timer};
pub use presign::{validate_expiry, DEFAULT_PRESIGN_EXPIRY, MAX_PRESIGN_EXPIRY};
pub use traits::BlobStore;
