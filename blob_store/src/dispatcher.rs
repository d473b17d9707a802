//! Blob store dispatcher that routes to appropriate backend based on URI
//! scheme.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use opentelemetry::{metrics::Meter, KeyValue};

#[cfg(feature = "aws")]
use crate::backends::s3::S3BlobStore;
use crate::{
    backends::local::LocalBlobStore,
    BlobError,
    BlobMetadata,
    BlobMetrics,
    BlobResult,
    BlobStorageConfig,
    BlobStore,
    Timer,
};

/// Dispatcher that routes blob operations to the appropriate backend.
pub struct BlobStoreDispatcher {
    backends: HashMap<String, Arc<dyn BlobStore>>,
    default_backend: Arc<dyn BlobStore>,
    root: String,
    metrics: Option<BlobMetrics>,
}

impl BlobStoreDispatcher {
    /// Create a new dispatcher from configuration.
    pub async fn new(config: BlobStorageConfig) -> BlobResult<Self> {
        let mut backends: HashMap<String, Arc<dyn BlobStore>> = HashMap::new();

        let scheme = Self::extract_scheme(&config.path)?;
        let default_backend: Arc<dyn BlobStore> = match scheme.as_str() {
            "file" => Arc::new(LocalBlobStore::new()),
            #[cfg(feature = "aws")]
            "s3" => Arc::new(S3BlobStore::new(&config.path, config.region).await?),
            #[cfg(not(feature = "aws"))]
            "s3" => {
                return Err(BlobError::UnsupportedBackend {
                    scheme: "s3 (feature not enabled)".to_string(),
                });
            }
            scheme => {
                return Err(BlobError::UnsupportedBackend {
                    scheme: scheme.to_string(),
                });
            }
        };
        backends.insert(scheme, default_backend.clone());

        // Always include local backend as fallback
        if !backends.contains_key("file") {
            backends.insert("file".to_string(), Arc::new(LocalBlobStore::new()));
        }

        Ok(Self {
            backends,
            default_backend,
            root: config.path.trim_end_matches('/').to_string(),
            metrics: None,
        })
    }

    /// Create a new dispatcher that records operation metrics.
    pub async fn new_with_metrics(config: BlobStorageConfig, meter: &Meter) -> BlobResult<Self> {
        let mut dispatcher = Self::new(config).await?;
        dispatcher.metrics = Some(BlobMetrics::new(meter));
        Ok(dispatcher)
    }

    /// The configured storage root, without a trailing slash.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Extract URI scheme (e.g., "s3", "file").
    fn extract_scheme(uri: &str) -> BlobResult<String> {
        match uri.split_once("://") {
            Some((scheme, _)) if !scheme.is_empty() => Ok(scheme.to_string()),
            _ => Err(BlobError::InvalidUri {
                uri: uri.to_string(),
                reason: "Missing scheme (expected format: scheme://...)".to_string(),
            }),
        }
    }

    /// Route to the appropriate backend based on URI scheme.
    fn route(&self, uri: &str) -> BlobResult<&dyn BlobStore> {
        let scheme = Self::extract_scheme(uri)?;

        Ok(self
            .backends
            .get(&scheme)
            .map(|b| b.as_ref())
            .unwrap_or(self.default_backend.as_ref()))
    }

    fn timer(&self, operation: &'static str) -> Option<Timer> {
        self.metrics.as_ref().map(|m| {
            Timer::start_with_labels(&m.operations, &[KeyValue::new("operation", operation)])
        })
    }

    fn observe<T>(&self, operation: &'static str, result: BlobResult<T>) -> BlobResult<T> {
        if let (Err(_), Some(metrics)) = (&result, &self.metrics) {
            metrics.record_error(operation);
        }
        result
    }
}

#[async_trait]
impl BlobStore for BlobStoreDispatcher {
    async fn get(&self, uri: &str) -> BlobResult<Vec<u8>> {
        let _timer = self.timer("get");
        let result = match self.route(uri) {
            Ok(backend) => backend.get(uri).await,
            Err(e) => Err(e),
        };
        self.observe("get", result)
    }

    async fn get_metadata(&self, uri: &str) -> BlobResult<BlobMetadata> {
        let _timer = self.timer("get_metadata");
        let result = match self.route(uri) {
            Ok(backend) => backend.get_metadata(uri).await,
            Err(e) => Err(e),
        };
        self.observe("get_metadata", result)
    }

    /// Turn an object reference into a full URI.
    ///
    /// References that already carry a scheme are returned unchanged; bare
    /// keys are joined onto the storage root. Either form is rejected when
    /// it contains a `..` segment.
    fn resolve(&self, reference: &str) -> BlobResult<String> {
        if reference.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(BlobError::InvalidUri {
                uri: reference.to_string(),
                reason: "parent directory segment".to_string(),
            });
        }
        if reference.contains("://") {
            Self::extract_scheme(reference)?;
            return Ok(reference.to_string());
        }
        let key = reference.trim_start_matches('/');
        if key.is_empty() {
            return Err(BlobError::InvalidUri {
                uri: reference.to_string(),
                reason: "empty object key".to_string(),
            });
        }
        Ok(format!("{}/{}", self.root, key))
    }

    async fn upload(&self, uri: &str, data: Vec<u8>) -> BlobResult<()> {
        let _timer = self.timer("upload");
        let result = match self.route(uri) {
            Ok(backend) => backend.upload(uri, data).await,
            Err(e) => Err(e),
        };
        self.observe("upload", result)
    }

    async fn presign_get_uri(&self, uri: &str, expires_in: Duration) -> BlobResult<String> {
        let _timer = self.timer("presign_get");
        let result = match self.route(uri) {
            Ok(backend) => backend.presign_get_uri(uri, expires_in).await,
            Err(e) => Err(e),
        };
        self.observe("presign_get", result)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn local_dispatcher(dir: &TempDir) -> BlobStoreDispatcher {
        BlobStoreDispatcher::new(BlobStorageConfig {
            path: format!("file://{}/", dir.path().display()),
            region: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_bare_keys_against_root() {
        let dir = TempDir::new().unwrap();
        let store = local_dispatcher(&dir).await;

        let root = format!("file://{}", dir.path().display());
        assert_eq!(store.root(), root);
        assert_eq!(
            store.resolve("invoices/a.pdf").unwrap(),
            format!("{}/invoices/a.pdf", root)
        );
        assert_eq!(
            store.resolve("/b.pdf").unwrap(),
            format!("{}/b.pdf", root)
        );
        assert_eq!(
            store.resolve("file:///elsewhere/c.pdf").unwrap(),
            "file:///elsewhere/c.pdf"
        );
        assert!(store.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_resolve_rejects_parent_segments() {
        let dir = TempDir::new().unwrap();
        let store = local_dispatcher(&dir).await;

        for reference in [
            "../escaped.zip",
            "bundles/../../escaped.zip",
            "a\\..\\b.pdf",
            "file:///tmp/root/../escaped.zip",
        ] {
            let err = store.resolve(reference).unwrap_err();
            assert!(
                matches!(err, BlobError::InvalidUri { .. }),
                "{reference}: {err:?}"
            );
        }
        assert_eq!(
            store.resolve("bundles/..hidden/a..b.pdf").unwrap(),
            format!("file://{}/bundles/..hidden/a..b.pdf", dir.path().display())
        );
    }

    #[tokio::test]
    async fn test_round_trip_through_dispatcher() {
        let dir = TempDir::new().unwrap();
        let store = local_dispatcher(&dir).await;

        let uri = store.resolve("bundles/t.zip").unwrap();
        store.upload(&uri, b"zip bytes".to_vec()).await.unwrap();
        assert!(store.exists(&uri).await.unwrap());
        assert_eq!(store.get(&uri).await.unwrap(), b"zip bytes");
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let result = BlobStoreDispatcher::new(BlobStorageConfig {
            path: "ftp://host/files".to_string(),
            region: None,
        })
        .await;
        assert!(matches!(result, Err(BlobError::UnsupportedBackend { .. })));

        let result = BlobStoreDispatcher::new(BlobStorageConfig {
            path: "/no/scheme".to_string(),
            region: None,
        })
        .await;
        assert!(matches!(result, Err(BlobError::InvalidUri { .. })));
    }
}
