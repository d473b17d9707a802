//! Blob metadata structures.

use serde::{Deserialize, Serialize};

/// Metadata about a stored object, as reported by a HEAD-style request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobMetadata {
    pub size_bytes: u64,

    /// ETag from the object store, when the backend reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl BlobMetadata {
    pub fn with_size(size_bytes: u64) -> Self {
        Self {
            size_bytes,
            etag: None,
        }
    }
}
