//! Fetch stage: pull every referenced blob into the staging area.

use blob_store::BlobStore;
use data_model::{FetchFailure, LookupRecord};
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{BundleError, BundleResult},
    staging::{StagedBlob, StagingArea},
};

/// Outcome of fetching one record. Failures are carried, not raised, so one
/// bad object never aborts the batch.
#[derive(Debug)]
pub struct FetchResult {
    pub record: LookupRecord,
    pub outcome: BundleResult<StagedBlob>,
}

impl FetchResult {
    pub fn object_ref(&self) -> &str {
        &self.record.object_ref
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn staged(&self) -> Option<&StagedBlob> {
        self.outcome.as_ref().ok()
    }

    pub fn failure(&self) -> Option<FetchFailure> {
        self.outcome.as_ref().err().map(|e| FetchFailure {
            object_ref: self.record.object_ref.clone(),
            error_kind: e.kind(),
            message: e.to_string(),
        })
    }
}

/// Fetch `records` into `staging` with at most `concurrency` downloads in
/// flight.
///
/// Staging keys are reserved up front in record order, so key assignment does
/// not depend on completion order. Results come back in record order. Once
/// `cancel` fires no further downloads start and in-flight ones are dropped;
/// the returned vector then only holds the records that finished.
pub async fn fetch(
    store: &dyn BlobStore,
    records: Vec<LookupRecord>,
    staging: &mut StagingArea,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<FetchResult> {
    let jobs: Vec<(usize, LookupRecord, String)> = records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            let key = staging.reserve_key(&record);
            (idx, record, key)
        })
        .collect();
    let total = jobs.len();
    let staging = &*staging;

    let mut results: Vec<(usize, FetchResult)> = stream::iter(jobs)
        .map(|(idx, record, key)| async move { (idx, fetch_one(store, staging, record, key).await) })
        .buffer_unordered(concurrency.max(1))
        .take_until(cancel.cancelled())
        .collect()
        .await;
    results.sort_by_key(|(idx, _)| *idx);

    if results.len() < total {
        warn!(
            completed = results.len(),
            total, "fetch stage interrupted by cancellation"
        );
    }

    results.into_iter().map(|(_, result)| result).collect()
}

async fn fetch_one(
    store: &dyn BlobStore,
    staging: &StagingArea,
    record: LookupRecord,
    key: String,
) -> FetchResult {
    let outcome = async {
        let uri = store
            .resolve(&record.object_ref)
            .map_err(|e| BundleError::from_read(&record.object_ref, e))?;
        let data = store
            .get(&uri)
            .await
            .map_err(|e| BundleError::from_read(&record.object_ref, e))?;
        staging
            .write_blob(&key, &data)
            .await
            .map_err(|source| BundleError::Staging { source })
    }
    .await;

    match &outcome {
        Ok(staged) => debug!(
            object_ref = %record.object_ref,
            key = %staged.key,
            size_bytes = staged.size_bytes,
            "staged object"
        ),
        Err(e) => warn!(
            object_ref = %record.object_ref,
            error_kind = %e.kind(),
            "failed to fetch object: {}", e
        ),
    }

    FetchResult { record, outcome }
}
