//! Blob storage configuration.

use std::env;

use serde::{Deserialize, Serialize};

/// Configuration for blob storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    /// Storage root (e.g., `file:///path`, `s3://bucket/prefix`). Object keys
    /// without a scheme are resolved against it.
    #[serde(default = "default_blob_store_path")]
    pub path: String,

    /// AWS region (for S3).
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        Self {
            path: default_blob_store_path(),
            region: None,
        }
    }
}

/// Default blob store path (local filesystem).
pub fn default_blob_store_path() -> String {
    format!(
        "file://{}",
        env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join("bundler_storage/blobs")
            .to_str()
            .unwrap_or("./bundler_storage/blobs")
    )
}
