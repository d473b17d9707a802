//! S3 blob store backend using object_store + aws-sdk-s3 for presigning.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Region, presigning::PresigningConfig, Client as S3Client};
use bytes::Bytes;
use object_store::{
    aws::{AmazonS3, AmazonS3Builder},
    path::Path as ObjectPath,
    ObjectStore,
};
use tracing::debug;

use crate::{presign, BlobError, BlobMetadata, BlobResult, BlobStore};

/// S3 blob store backend bound to a single bucket.
pub struct S3BlobStore {
    /// object_store client for data I/O.
    object_store: Arc<AmazonS3>,

    /// AWS SDK S3 client for presigning.
    s3_client: S3Client,

    /// Bucket name extracted from base path.
    bucket: String,
}

impl S3BlobStore {
    /// Create a new S3 blob store from a base URL.
    ///
    /// # Arguments
    /// * `url` - S3 URL (e.g., `s3://bucket/prefix`)
    /// * `region` - Optional AWS region override
    pub async fn new(url: &str, region: Option<String>) -> BlobResult<Self> {
        let (bucket, prefix) = Self::parse_s3_url(url)?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);
        if let Some(ref r) = region {
            builder = builder.with_region(r);
        }
        let object_store = builder.build().map_err(|e| BlobError::NetworkError {
            source: anyhow::Error::from(e),
        })?;

        let mut config_loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(r) = region {
            config_loader = config_loader.region(Region::new(r));
        }
        let aws_config = config_loader.load().await;
        let s3_client = S3Client::new(&aws_config);

        debug!(
            bucket = %bucket,
            prefix = %prefix,
            "Created S3 blob store"
        );

        Ok(Self {
            object_store: Arc::new(object_store),
            s3_client,
            bucket,
        })
    }

    /// Parse S3 URL into bucket and key (or prefix).
    fn parse_s3_url(url: &str) -> BlobResult<(String, String)> {
        let without_scheme = url
            .strip_prefix("s3://")
            .ok_or_else(|| BlobError::InvalidUri {
                uri: url.to_string(),
                reason: "Must start with s3://".to_string(),
            })?;

        let (bucket, key) = match without_scheme.split_once('/') {
            Some((bucket, key)) => (bucket, key.trim_end_matches('/')),
            None => (without_scheme, ""),
        };
        if bucket.is_empty() {
            return Err(BlobError::InvalidUri {
                uri: url.to_string(),
                reason: "Missing bucket name".to_string(),
            });
        }

        Ok((bucket.to_string(), key.to_string()))
    }

    /// Extract the object key from a full URI, checking it targets our bucket.
    fn key_from_uri(&self, uri: &str) -> BlobResult<String> {
        let (bucket, key) = Self::parse_s3_url(uri)?;
        if bucket != self.bucket {
            return Err(BlobError::InvalidUri {
                uri: uri.to_string(),
                reason: format!("bucket does not match configured bucket {}", self.bucket),
            });
        }
        if key.is_empty() {
            return Err(BlobError::InvalidUri {
                uri: uri.to_string(),
                reason: "Missing object key".to_string(),
            });
        }
        Ok(key)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, uri: &str) -> BlobResult<Vec<u8>> {
        let path = ObjectPath::from(self.key_from_uri(uri)?);

        let result = self.object_store.get(&path).await?;
        let bytes = result.bytes().await?;

        Ok(bytes.to_vec())
    }

    async fn get_metadata(&self, uri: &str) -> BlobResult<BlobMetadata> {
        let path = ObjectPath::from(self.key_from_uri(uri)?);

        let metadata = self.object_store.head(&path).await?;

        Ok(BlobMetadata {
            size_bytes: metadata.size as u64,
            etag: metadata.e_tag.clone(),
        })
    }

    async fn upload(&self, uri: &str, data: Vec<u8>) -> BlobResult<()> {
        let path = ObjectPath::from(self.key_from_uri(uri)?);

        self.object_store
            .put(&path, Bytes::from(data).into())
            .await?;

        Ok(())
    }

    async fn presign_get_uri(&self, uri: &str, expires_in: Duration) -> BlobResult<String> {
        presign::validate_expiry(expires_in).map_err(|e| BlobError::PresignError { reason: e })?;

        let key = self.key_from_uri(uri)?;

        let presigning_config =
            PresigningConfig::expires_in(expires_in).map_err(|e| BlobError::PresignError {
                reason: format!("Failed to create presigning config: {}", e),
            })?;

        let presigned = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning_config)
            .await
            .map_err(|e| BlobError::PresignError {
                reason: format!("Failed to generate presigned GET URL: {}", e),
            })?;

        Ok(presigned.uri().to_string())
    }
}
