use std::path::PathBuf;

use anyhow::Result;
use blob_store::BlobStorageConfig;
use bundler::BundlerConfig;
use data_model::LookupRecord;
use lookup_index::LookupIndexConfig;
use tempfile::TempDir;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{config::ServerConfig, service::Service};

/// A service wired to a JSON lookup file and a local blob store under one
/// temp dir.
pub struct TestService {
    pub service: Service,
    pub blob_root: PathBuf,
    pub staging_root: PathBuf,
    pub records_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestService {
    pub async fn new(records: &[LookupRecord]) -> Result<Self> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let temp_dir = tempfile::tempdir()?;
        let blob_root = temp_dir.path().join("blob_store");
        let staging_root = temp_dir.path().join("staging");
        let records_path = temp_dir.path().join("records.json");
        std::fs::create_dir_all(&blob_root)?;
        std::fs::create_dir_all(&staging_root)?;
        std::fs::write(&records_path, serde_json::to_vec(records)?)?;

        let cfg = ServerConfig {
            blob_storage: BlobStorageConfig {
                path: format!("file://{}", blob_root.display()),
                region: None,
            },
            lookup_index: LookupIndexConfig::File {
                path: records_path.display().to_string(),
            },
            bundler: BundlerConfig {
                archive_prefix: Some("bundles".to_string()),
                staging_dir: Some(staging_root.clone()),
                ..Default::default()
            },
            ..Default::default()
        };
        cfg.validate()?;
        let service = Service::new(cfg).await?;

        Ok(Self {
            service,
            blob_root,
            staging_root,
            records_path,
            _temp_dir: temp_dir,
        })
    }

    /// Store `data` under `key` relative to the blob root.
    pub fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.blob_root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn staging_is_empty(&self) -> Result<bool> {
        Ok(std::fs::read_dir(&self.staging_root)?.next().is_none())
    }
}
