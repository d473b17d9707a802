use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_URL_TTL_SECS: u64 = blob_store::DEFAULT_PRESIGN_EXPIRY.as_secs();
const DEFAULT_FETCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundlerConfig {
    /// Lifetime of minted access URLs unless a request overrides it.
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,

    /// Maximum number of blob downloads in flight per run.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Key prefix for published archives, relative to the blob storage root.
    #[serde(default)]
    pub archive_prefix: Option<String>,

    /// Parent directory for per-run staging areas. Defaults to the system
    /// temp dir.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            url_ttl_secs: DEFAULT_URL_TTL_SECS,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            archive_prefix: None,
            staging_dir: None,
        }
    }
}

fn default_url_ttl_secs() -> u64 {
    DEFAULT_URL_TTL_SECS
}

fn default_fetch_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}

impl BundlerConfig {
    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }

    /// Object key an artifact named `name` is published under.
    pub fn artifact_key(&self, name: &str) -> String {
        match self
            .archive_prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
        {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_concurrency == 0 {
            return Err(anyhow!("fetch_concurrency must be greater than zero"));
        }
        blob_store::validate_expiry(self.url_ttl())
            .map_err(|e| anyhow!("invalid url_ttl_secs: {}", e))?;
        Ok(())
    }
}
