//! Archive builder: packs staged blobs into one ZIP artifact.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use chrono::{DateTime, Datelike, Timelike, Utc};
use data_model::ManifestEntry;
use flate2::{write::DeflateEncoder, Compression};
use tracing::{debug, info};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::{
    clock::Clock,
    error::{BundleError, BundleResult},
    staging::{StagedBlob, StagingArea},
};

const ENTRY_PERMISSIONS: u32 = 0o644;

/// A built archive living in the staging area, ready to publish.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub manifest: Vec<ManifestEntry>,
    pub created_at: DateTime<Utc>,
}

/// `{tag}_{YYYY-MM-DD_HH-MM-SS}.zip`, second resolution.
///
/// The tag is flattened into a single path segment first, so the name can
/// never climb out of or nest under the archive prefix.
pub fn artifact_name(tag: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.zip", name_label(tag), at.format("%Y-%m-%d_%H-%M-%S"))
}

// Separators, control characters and leading dots become `_`.
fn name_label(tag: &str) -> String {
    let mut leading = true;
    let label: String = tag
        .chars()
        .map(|c| {
            let replace = c == '/' || c == '\\' || c.is_control() || (leading && c == '.');
            leading = leading && c == '.';
            if replace {
                '_'
            } else {
                c
            }
        })
        .collect();
    if label.is_empty() {
        "bundle".to_string()
    } else {
        label
    }
}

/// Build the artifact for `tag` from the successfully staged blobs.
///
/// Entries are added in the order given and named by their staging keys. The
/// build timestamp is read once, names the artifact and stamps every entry,
/// so identical inputs at the same second give identical bytes.
pub async fn build(
    tag: &str,
    clock: &dyn Clock,
    successes: &[StagedBlob],
    staging: &StagingArea,
) -> BundleResult<Artifact> {
    if successes.is_empty() {
        return Err(BundleError::EmptyArchive);
    }

    let created_at = clock.now();
    let name = artifact_name(tag, created_at);
    let path = staging.artifact_path();
    let entries = successes.to_vec();

    let (size_bytes, manifest) = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || write_archive(&path, &entries, created_at))
            .await
            .map_err(|e| BundleError::Archive {
                source: anyhow!("archive task failed: {}", e),
            })??
    };

    info!(
        artifact = %name,
        entries = manifest.len(),
        size_bytes,
        "built archive"
    );

    Ok(Artifact {
        name,
        path,
        size_bytes,
        manifest,
        created_at,
    })
}

fn write_archive(
    path: &Path,
    entries: &[StagedBlob],
    at: DateTime<Utc>,
) -> BundleResult<(u64, Vec<ManifestEntry>)> {
    let file = File::create(path).map_err(|source| BundleError::Staging { source })?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let modified = zip_timestamp(at);
    let mut manifest = Vec::with_capacity(entries.len());

    for entry in entries {
        let data = std::fs::read(&entry.path).map_err(|source| BundleError::Staging { source })?;
        let method = choose_method(&data)?;
        let options = SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(modified)
            .unix_permissions(ENTRY_PERMISSIONS)
            .large_file(data.len() as u64 >= u32::MAX as u64);

        writer.start_file(entry.key.as_str(), options)?;
        writer
            .write_all(&data)
            .map_err(|e| BundleError::Archive { source: e.into() })?;
        debug!(entry = %entry.key, size_bytes = data.len(), ?method, "added archive entry");

        manifest.push(ManifestEntry {
            name: entry.key.clone(),
            size_bytes: data.len() as u64,
        });
    }

    let mut inner = writer.finish()?;
    inner
        .flush()
        .map_err(|source| BundleError::Staging { source })?;
    drop(inner);

    let size_bytes = std::fs::metadata(path)
        .map_err(|source| BundleError::Staging { source })?
        .len();
    Ok((size_bytes, manifest))
}

/// Deflate unless that would not shrink the entry, so no entry is ever
/// larger than its source.
fn choose_method(data: &[u8]) -> BundleResult<CompressionMethod> {
    if data.is_empty() {
        return Ok(CompressionMethod::Stored);
    }
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| BundleError::Archive { source: e.into() })?;
    let compressed = encoder
        .finish()
        .map_err(|e| BundleError::Archive { source: e.into() })?;

    if compressed.len() < data.len() {
        Ok(CompressionMethod::Deflated)
    } else {
        Ok(CompressionMethod::Stored)
    }
}

// ZIP timestamps start at 1980; anything earlier gets the format's epoch.
fn zip_timestamp(at: DateTime<Utc>) -> zip::DateTime {
    let year = u16::try_from(at.year()).unwrap_or(0);
    zip::DateTime::from_date_and_time(
        year,
        at.month() as u8,
        at.day() as u8,
        at.hour() as u8,
        at.minute() as u8,
        at.second() as u8,
    )
    .unwrap_or_default()
}
