//! Lookup table stored as a JSON file, for local runs and tests.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use async_trait::async_trait;
use data_model::LookupRecord;
use serde_json::error::Category;
use tracing::debug;

use crate::{LookupError, LookupIndex, LookupResult};

/// Reads a JSON array of records on every call; nothing is cached.
pub struct FileLookupIndex {
    path: PathBuf,
}

impl FileLookupIndex {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn load(&self) -> LookupResult<Vec<LookupRecord>> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            LookupError::unavailable(
                anyhow!(e).context(format!("reading {}", self.path.display())),
            )
        })?;
        serde_json::from_slice::<Vec<LookupRecord>>(&raw).map_err(|e| match e.classify() {
            Category::Data => LookupError::MalformedRecord {
                reason: e.to_string(),
            },
            _ => LookupError::unavailable(
                anyhow!(e).context(format!("parsing {}", self.path.display())),
            ),
        })
    }
}

#[async_trait]
impl LookupIndex for FileLookupIndex {
    async fn query_by_tag(&self, tag: &str) -> LookupResult<Vec<LookupRecord>> {
        let records: Vec<LookupRecord> = self
            .load()
            .await?
            .into_iter()
            .filter(|r| r.tag == tag)
            .collect();
        debug!(tag, count = records.len(), "queried file lookup index");
        Ok(records)
    }

    async fn get_by_id(&self, id: &str) -> LookupResult<Option<LookupRecord>> {
        Ok(self.load().await?.into_iter().find(|r| r.id == id))
    }
}
