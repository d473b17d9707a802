//! Per-run scratch space for fetched blobs and the built archive.

use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
};

use data_model::LookupRecord;
use tempfile::TempDir;
use tracing::{debug, warn};

const BLOBS_DIR: &str = "blobs";
const OUTPUT_DIR: &str = "out";
const ARTIFACT_FILE: &str = "artifact.zip";

/// A blob written into the staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBlob {
    /// Unique key inside this staging area; becomes the archive entry name.
    pub key: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Exclusively owned temporary directory for one orchestration run.
///
/// Everything under it is deleted when the area is dropped, whichever way the
/// run ends.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    blobs: PathBuf,
    output: PathBuf,
    // Lowercased, so keys stay distinct on case-insensitive filesystems.
    reserved: HashSet<String>,
}

impl StagingArea {
    pub fn new(base: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("bundle-");
        let dir = match base {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };
        let blobs = dir.path().join(BLOBS_DIR);
        let output = dir.path().join(OUTPUT_DIR);
        std::fs::create_dir(&blobs)?;
        std::fs::create_dir(&output)?;
        debug!(path = %dir.path().display(), "created staging area");

        Ok(Self {
            dir,
            blobs,
            output,
            reserved: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Reserve a unique staging key for a record.
    ///
    /// The key is the basename of the object reference (the record id when
    /// the reference has no usable basename). A key already taken gets a
    /// numeric suffix before its extension: `a.pdf`, `a-1.pdf`, `a-2.pdf`.
    pub fn reserve_key(&mut self, record: &LookupRecord) -> String {
        let base = record
            .basename()
            .map(str::to_string)
            .unwrap_or_else(|| fallback_name(&record.id));

        if self.reserved.insert(base.to_lowercase()) {
            return base;
        }

        let (stem, ext) = split_extension(&base);
        let mut n = 1;
        loop {
            let candidate = format!("{}-{}{}", stem, n, ext);
            if self.reserved.insert(candidate.to_lowercase()) {
                warn!(
                    object_ref = %record.object_ref,
                    key = %candidate,
                    "basename collision in staging area, using suffixed key"
                );
                return candidate;
            }
            n += 1;
        }
    }

    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.blobs.join(key)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.output.join(ARTIFACT_FILE)
    }

    /// Write fetched bytes under a reserved key.
    pub async fn write_blob(&self, key: &str, data: &[u8]) -> io::Result<StagedBlob> {
        let path = self.blob_path(key);
        tokio::fs::write(&path, data).await?;
        Ok(StagedBlob {
            key: key.to_string(),
            path,
            size_bytes: data.len() as u64,
        })
    }

    /// Delete the staging directory now, reporting failures instead of
    /// ignoring them as drop does.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

fn fallback_name(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "object".to_string(),
        _ => cleaned,
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, object_ref: &str) -> LookupRecord {
        LookupRecord::new(id, "tag", object_ref)
    }

    #[test]
    fn test_reserve_key_disambiguates_collisions() {
        let mut staging = StagingArea::new(None).unwrap();

        assert_eq!(staging.reserve_key(&record("1", "x/a.pdf")), "a.pdf");
        assert_eq!(staging.reserve_key(&record("2", "y/a.pdf")), "a-1.pdf");
        assert_eq!(staging.reserve_key(&record("3", "z/A.PDF")), "A-2.PDF");
        assert_eq!(staging.reserve_key(&record("4", "z/a-1.pdf")), "a-1-1.pdf");
        assert_eq!(staging.reserve_key(&record("5", "notes")), "notes");
        assert_eq!(staging.reserve_key(&record("6", "other/notes")), "notes-1");
        assert_eq!(staging.reserve_key(&record("7", ".env")), ".env");
        assert_eq!(staging.reserve_key(&record("8", "b/.env")), ".env-1");
    }

    #[test]
    fn test_reserve_key_falls_back_to_id() {
        let mut staging = StagingArea::new(None).unwrap();

        assert_eq!(staging.reserve_key(&record("rec/9", "..")), "rec_9");
        assert_eq!(staging.reserve_key(&record("", "")), "object");
    }

    #[tokio::test]
    async fn test_write_blob_and_cleanup_on_drop() {
        let staging = StagingArea::new(None).unwrap();
        let root = staging.path().to_path_buf();

        let staged = staging.write_blob("a.pdf", &[1u8; 10]).await.unwrap();
        assert_eq!(staged.size_bytes, 10);
        assert_eq!(std::fs::read(&staged.path).unwrap(), vec![1u8; 10]);
        assert!(staged.path.starts_with(&root));

        drop(staging);
        assert!(!root.exists());
    }

    #[test]
    fn test_areas_are_isolated() {
        let base = TempDir::new().unwrap();
        let first = StagingArea::new(Some(base.path())).unwrap();
        let second = StagingArea::new(Some(base.path())).unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(base.path()));

        let root = first.path().to_path_buf();
        first.close().unwrap();
        assert!(!root.exists());
        assert!(second.path().exists());
    }
}
