//! Core blob store trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::{BlobMetadata, BlobResult};

/// Core blob store operations.
///
/// Every call is a fresh round trip to the backing store; implementations do
/// not cache. Timeouts are the backend client's concern.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Get entire blob data.
    ///
    /// Returns `BlobError::NotFound` if the blob doesn't exist.
    async fn get(&self, uri: &str) -> BlobResult<Vec<u8>>;

    /// Get blob metadata without downloading content.
    ///
    /// Returns `BlobError::NotFound` if the blob doesn't exist.
    async fn get_metadata(&self, uri: &str) -> BlobResult<BlobMetadata>;

    /// Check whether a blob exists.
    async fn exists(&self, uri: &str) -> BlobResult<bool> {
        match self.get_metadata(uri).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Turn an object reference into a URI this store accepts.
    ///
    /// The default treats every reference as a full URI already.
    fn resolve(&self, reference: &str) -> BlobResult<String> {
        Ok(reference.to_string())
    }

    /// Upload blob data directly, replacing any existing object.
    async fn upload(&self, uri: &str, data: Vec<u8>) -> BlobResult<()>;

    /// Generate a presigned GET URL.
    ///
    /// The URL allows downloading the blob without authentication for the
    /// specified duration.
    ///
    /// # Arguments
    /// * `uri` - Blob URI (e.g., `s3://bucket/key` or `file:///path`)
    /// * `expires_in` - How long the URL is valid (max 7 days for S3)
    ///
    /// # Returns
    /// A presigned URL string. For local files, this is the original URI.
    async fn presign_get_uri(&self, uri: &str, expires_in: Duration) -> BlobResult<String>;
}
