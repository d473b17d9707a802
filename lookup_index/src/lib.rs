//! Lookup table client.
//!
//! The lookup table maps a tag (a secondary attribute) to the records that
//! reference blobs in the object store. Backends implement [`LookupIndex`];
//! [`build_lookup_index`] picks one from [`LookupIndexConfig`].

mod backends;
mod config;
mod error;

use std::sync::Arc;

use async_trait::async_trait;
pub use backends::file::FileLookupIndex;
#[cfg(feature = "aws")]
pub use backends::dynamodb::DynamoLookupIndex;
pub use config::{default_records_path, DynamoIndexConfig, LookupIndexConfig};
use data_model::LookupRecord;
pub use error::{LookupError, LookupResult};

/// Query interface over the lookup table.
///
/// A query either returns every matching record or fails; it never returns a
/// partial result.
#[async_trait]
pub trait LookupIndex: Send + Sync {
    /// All records carrying `tag`. An unknown or empty tag yields an empty
    /// vector.
    async fn query_by_tag(&self, tag: &str) -> LookupResult<Vec<LookupRecord>>;

    /// The record with primary key `id`, if any.
    async fn get_by_id(&self, id: &str) -> LookupResult<Option<LookupRecord>>;
}

pub async fn build_lookup_index(config: &LookupIndexConfig) -> LookupResult<Arc<dyn LookupIndex>> {
    match config {
        LookupIndexConfig::File { path } => Ok(Arc::new(FileLookupIndex::new(path))),
        #[cfg(feature = "aws")]
        LookupIndexConfig::Dynamodb(dynamo) => {
            Ok(Arc::new(DynamoLookupIndex::new(dynamo.clone()).await))
        }
        #[cfg(not(feature = "aws"))]
        LookupIndexConfig::Dynamodb(_) => Err(LookupError::Unavailable {
            source: anyhow::anyhow!("dynamodb lookup index requires the aws feature"),
        }),
    }
}
