//! Publish stage: store the artifact and mint a read grant for it.

use std::time::Duration;

use blob_store::{BlobError, BlobStore};
use chrono::TimeDelta;
use data_model::AccessGrant;
use tracing::{info, warn};

use crate::{
    archive::Artifact,
    clock::Clock,
    error::{BundleError, BundleResult},
};

/// Upload `artifact` to `uri`, confirm it is stored, then mint a grant.
///
/// No grant is minted unless the upload succeeded and the object is visible.
/// A signing failure after a successful upload leaves the object in place.
pub async fn publish(
    store: &dyn BlobStore,
    artifact: &Artifact,
    uri: &str,
    ttl: Duration,
    clock: &dyn Clock,
) -> BundleResult<AccessGrant> {
    let data = tokio::fs::read(&artifact.path)
        .await
        .map_err(|source| BundleError::Staging { source })?;

    store
        .upload(uri, data)
        .await
        .map_err(|source| BundleError::Publish {
            uri: uri.to_string(),
            source,
        })?;

    let stored = store
        .exists(uri)
        .await
        .map_err(|source| BundleError::Publish {
            uri: uri.to_string(),
            source,
        })?;
    if !stored {
        return Err(BundleError::Publish {
            uri: uri.to_string(),
            source: BlobError::NotFound {
                uri: uri.to_string(),
            },
        });
    }
    info!(uri, size_bytes = artifact.size_bytes, "uploaded artifact");

    mint_access_grant(store, uri, ttl, clock).await.inspect_err(|_| {
        warn!(uri, "artifact stored but no access url could be minted");
    })
}

/// Presign a GET for `uri`, valid for `ttl` from now.
pub async fn mint_access_grant(
    store: &dyn BlobStore,
    uri: &str,
    ttl: Duration,
    clock: &dyn Clock,
) -> BundleResult<AccessGrant> {
    let signing_error = |source: BlobError| BundleError::Signing {
        uri: uri.to_string(),
        source,
    };
    let lifetime = TimeDelta::from_std(ttl).map_err(|e| {
        signing_error(BlobError::PresignError {
            reason: e.to_string(),
        })
    })?;
    let issued_at = clock.now();
    let url = store
        .presign_get_uri(uri, ttl)
        .await
        .map_err(signing_error)?;

    Ok(AccessGrant {
        url,
        expires_at: issued_at + lifetime,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use data_model::ErrorKind;

    use super::*;
    use crate::{clock::FixedClock, staging::StagingArea, testing::InMemoryBlobStore};

    async fn artifact(staging: &StagingArea) -> Artifact {
        let path = staging.artifact_path();
        tokio::fs::write(&path, b"PK fake archive").await.unwrap();
        Artifact {
            name: "t_2024-01-01_00-00-00.zip".to_string(),
            path,
            size_bytes: 15,
            manifest: vec![],
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_publish_uploads_then_signs() {
        let store = InMemoryBlobStore::new();
        let staging = StagingArea::new(None).unwrap();
        let artifact = artifact(&staging).await;

        let grant = publish(
            &store,
            &artifact,
            "mem://t.zip",
            Duration::from_secs(3600),
            &clock(),
        )
        .await
        .unwrap();

        assert!(grant.url.starts_with("https://"));
        assert_eq!(
            grant.expires_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()
        );
        assert_eq!(store.object("mem://t.zip").unwrap(), b"PK fake archive");
    }

    #[tokio::test]
    async fn test_upload_failure_mints_nothing() {
        let store = InMemoryBlobStore::new();
        store.fail_uploads();
        let staging = StagingArea::new(None).unwrap();
        let artifact = artifact(&staging).await;

        let err = publish(&store, &artifact, "mem://t.zip", Duration::from_secs(60), &clock())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PublishError);
        assert_eq!(store.presign_calls(), 0);
    }

    #[tokio::test]
    async fn test_signing_failure_leaves_object() {
        let store = InMemoryBlobStore::new();
        store.fail_presign();
        let staging = StagingArea::new(None).unwrap();
        let artifact = artifact(&staging).await;

        let err = publish(&store, &artifact, "mem://t.zip", Duration::from_secs(60), &clock())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SigningError);
        assert!(store.object("mem://t.zip").is_some());
    }
}
