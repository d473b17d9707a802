//! Local filesystem blob store backend.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use tracing::debug;

use crate::{presign, BlobError, BlobMetadata, BlobResult, BlobStore};

/// Local filesystem blob store.
pub struct LocalBlobStore;

impl LocalBlobStore {
    /// Create a new local filesystem blob store.
    pub fn new() -> Self {
        Self
    }

    /// Extract filesystem path from file:// URI.
    fn path_from_uri(uri: &str) -> BlobResult<PathBuf> {
        match uri.strip_prefix("file://") {
            Some(path_str) if !path_str.is_empty() => Ok(PathBuf::from(path_str)),
            _ => Err(BlobError::InvalidUri {
                uri: uri.to_string(),
                reason: "URI must start with file:// and name a path".to_string(),
            }),
        }
    }

    fn map_io_error(uri: &str, e: std::io::Error) -> BlobError {
        if e.kind() == std::io::ErrorKind::NotFound {
            BlobError::NotFound {
                uri: uri.to_string(),
            }
        } else {
            BlobError::IoError { source: e }
        }
    }
}

impl Default for LocalBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, uri: &str) -> BlobResult<Vec<u8>> {
        let path = Self::path_from_uri(uri)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Self::map_io_error(uri, e))
    }

    async fn get_metadata(&self, uri: &str) -> BlobResult<BlobMetadata> {
        let path = Self::path_from_uri(uri)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Self::map_io_error(uri, e))?;
        if metadata.is_dir() {
            return Err(BlobError::NotFound {
                uri: uri.to_string(),
            });
        }

        Ok(BlobMetadata::with_size(metadata.len()))
    }

    async fn upload(&self, uri: &str, data: Vec<u8>) -> BlobResult<()> {
        let path = Self::path_from_uri(uri)?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, data).await?;
        debug!(uri, "wrote local blob");
        Ok(())
    }

    async fn presign_get_uri(&self, uri: &str, expires_in: Duration) -> BlobResult<String> {
        presign::validate_expiry(expires_in).map_err(|e| BlobError::PresignError { reason: e })?;
        // For local files, the URI itself is sufficient (shared filesystem assumption)
        Self::path_from_uri(uri)?;
        Ok(uri.to_string())
    }
}
