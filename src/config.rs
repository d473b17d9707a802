use std::{net::SocketAddr, path::Path, time::Duration};

use anyhow::{Context, Result};
use blob_store::BlobStorageConfig;
use bundler::BundlerConfig;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use lookup_index::LookupIndexConfig;
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "BUNDLER_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub blob_storage: BlobStorageConfig,
    #[serde(default)]
    pub lookup_index: LookupIndexConfig,
    #[serde(default)]
    pub bundler: BundlerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enable_metrics: bool,
    // OTLP collector grpc endpoint. Falls back to OTEL_EXPORTER_OTLP_ENDPOINT,
    // then localhost:4317.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval_secs() -> u64 {
    10
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            endpoint: None,
            metrics_interval_secs: default_metrics_interval_secs(),
        }
    }
}

impl TelemetryConfig {
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }
}

fn default_env() -> String {
    "local".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8900".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            env: default_env(),
            listen_addr: default_listen_addr(),
            blob_storage: Default::default(),
            lookup_index: Default::default(),
            bundler: Default::default(),
            telemetry: Default::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_path(path: &Path) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::load(Figment::new().merge(Yaml::string(&config_str)))
    }

    /// Defaults overlaid with `BUNDLER_` environment variables only.
    pub fn from_env() -> Result<ServerConfig> {
        Self::load(Figment::new())
    }

    fn load(figment: Figment) -> Result<ServerConfig> {
        // Nested keys use a double underscore: BUNDLER_BUNDLER__FETCH_CONCURRENCY=4
        let config: ServerConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("parsing configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen address: {}",
                self.listen_addr
            ));
        }
        if self.blob_storage.path.is_empty() {
            return Err(anyhow::anyhow!("blob_storage.path must not be empty"));
        }
        self.bundler.validate()?;
        if self.telemetry.enable_metrics && self.telemetry.metrics_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "telemetry.metrics_interval_secs must be positive"
            ));
        }
        Ok(())
    }

    pub fn structured_logging(&self) -> bool {
        self.env != "local"
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_config_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
env: prod
listen_addr: 127.0.0.1:9000
blob_storage:
  path: s3://bundles-bucket/root
  region: us-west-2
lookup_index:
  dynamodb:
    table_name: files
    tag_index: tag-index
bundler:
  url_ttl_secs: 600
  archive_prefix: bundles
telemetry:
  enable_metrics: true
  endpoint: http://collector:4317
"#
        )
        .unwrap();

        let config = ServerConfig::from_path(file.path()).unwrap();

        assert_eq!(config.env, "prod");
        assert!(config.structured_logging());
        assert_eq!(config.blob_storage.path, "s3://bundles-bucket/root");
        assert_eq!(config.bundler.url_ttl_secs, 600);
        assert_eq!(config.bundler.fetch_concurrency, 8);
        assert_eq!(config.bundler.archive_prefix.as_deref(), Some("bundles"));
        assert!(config.telemetry.enable_metrics);
        assert_eq!(
            config.telemetry.endpoint.as_deref(),
            Some("http://collector:4317")
        );
        assert_eq!(config.telemetry.metrics_interval(), Duration::from_secs(10));
        match config.lookup_index {
            LookupIndexConfig::Dynamodb(dynamo) => {
                assert_eq!(dynamo.table_name, "files");
                assert_eq!(dynamo.object_ref_attribute, "uri");
            }
            other => panic!("unexpected lookup index config: {:?}", other),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.structured_logging());
        assert!(!config.telemetry.enable_metrics);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen_addr: not-an-address").unwrap();
        assert!(ServerConfig::from_path(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bundler:\n  url_ttl_secs: 0").unwrap();
        assert!(ServerConfig::from_path(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "telemetry:\n  enable_metrics: true\n  metrics_interval_secs: 0"
        )
        .unwrap();
        assert!(ServerConfig::from_path(file.path()).is_err());

        assert!(ServerConfig::from_path(Path::new("/definitely/not/here.yaml")).is_err());
    }
}
