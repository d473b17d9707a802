//! Sequences lookup, fetch, archive and publish for one request.

use std::{
    any::Any,
    fmt::{self, Display},
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use blob_store::{BlobError, BlobStore};
use data_model::{ArtifactSummary, ErrorKind, LookupRecord, RunOutcome, Stage};
use futures::FutureExt;
use lookup_index::LookupIndex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    archive,
    clock::{Clock, SystemClock},
    config::BundlerConfig,
    error::{BundleError, BundleResult},
    fetch,
    publish,
    staging::StagingArea,
};

/// How a run finds its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Tag(String),
    Id(String),
}

impl Lookup {
    /// The tag or id; used as the artifact name prefix.
    pub fn label(&self) -> &str {
        match self {
            Lookup::Tag(tag) => tag,
            Lookup::Id(id) => id,
        }
    }
}

impl Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Tag(tag) => write!(f, "tag:{}", tag),
            Lookup::Id(id) => write!(f, "id:{}", id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub lookup: Lookup,
    /// Overrides the configured access URL lifetime.
    pub ttl: Option<Duration>,
    pub cancel: CancellationToken,
}

impl RunRequest {
    pub fn by_tag(tag: impl Into<String>) -> Self {
        Self::new(Lookup::Tag(tag.into()))
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(Lookup::Id(id.into()))
    }

    fn new(lookup: Lookup) -> Self {
        Self {
            lookup,
            ttl: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Remembers the stage a run is in so a failure, including a panic, can be
/// attributed to it.
struct StageTracker(Mutex<Stage>);

impl StageTracker {
    fn new() -> Self {
        Self(Mutex::new(Stage::Querying))
    }

    fn enter(&self, stage: Stage) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = stage;
    }

    fn current(&self) -> Stage {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs the bundling pipeline. Holds no per-run state, so one instance can
/// serve any number of concurrent runs.
pub struct Orchestrator {
    index: Arc<dyn LookupIndex>,
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    config: BundlerConfig,
}

impl Orchestrator {
    pub fn new(
        index: Arc<dyn LookupIndex>,
        store: Arc<dyn BlobStore>,
        config: BundlerConfig,
    ) -> Self {
        Self {
            index,
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &BundlerConfig {
        &self.config
    }

    /// Bundle every object tagged `tag` and return an access URL for it.
    pub async fn run(&self, tag: &str) -> RunOutcome {
        self.run_request(RunRequest::by_tag(tag)).await
    }

    /// Bundle the single object whose record id is `id`.
    pub async fn run_for_id(&self, id: &str) -> RunOutcome {
        self.run_request(RunRequest::by_id(id)).await
    }

    pub async fn run_request(&self, request: RunRequest) -> RunOutcome {
        let span = info_span!("bundle_run", run_id = %Uuid::new_v4(), lookup = %request.lookup);
        let stage = StageTracker::new();
        guarded(&stage, self.bundle(&request, &stage))
            .instrument(span)
            .await
    }

    /// Mint an access URL for the stored object behind record `id`, without
    /// bundling it.
    pub async fn share_object(
        &self,
        id: &str,
        ttl: Option<Duration>,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let span = info_span!("share_object", run_id = %Uuid::new_v4(), id);
        let stage = StageTracker::new();
        let ttl = ttl.unwrap_or_else(|| self.config.url_ttl());
        guarded(&stage, self.share(id, ttl, &cancel, &stage))
            .instrument(span)
            .await
    }

    async fn lookup(&self, lookup: &Lookup) -> BundleResult<Vec<LookupRecord>> {
        match lookup {
            Lookup::Tag(tag) => Ok(self.index.query_by_tag(tag).await?),
            Lookup::Id(id) => Ok(self.index.get_by_id(id).await?.into_iter().collect()),
        }
    }

    async fn bundle(&self, request: &RunRequest, stage: &StageTracker) -> BundleResult<RunOutcome> {
        let cancel = &request.cancel;

        stage.enter(Stage::Querying);
        let mut records = cancellable(cancel, self.lookup(&request.lookup)).await?;
        if records.is_empty() {
            info!("no records matched");
            return Ok(RunOutcome::NoItems);
        }
        records.sort_by(|a, b| {
            a.object_ref
                .cmp(&b.object_ref)
                .then_with(|| a.id.cmp(&b.id))
        });
        info!(records = records.len(), "lookup complete");

        stage.enter(Stage::Fetching);
        let mut staging = StagingArea::new(self.config.staging_dir.as_deref())
            .map_err(|source| BundleError::Staging { source })?;
        let results = fetch::fetch(
            self.store.as_ref(),
            records,
            &mut staging,
            self.config.fetch_concurrency,
            cancel,
        )
        .await;
        if cancel.is_cancelled() {
            return Err(BundleError::Cancelled);
        }

        let mut successes = Vec::new();
        let mut partial_failures = Vec::new();
        for result in &results {
            match (result.staged(), result.failure()) {
                (Some(staged), _) => successes.push(staged.clone()),
                (None, Some(failure)) => partial_failures.push(failure),
                (None, None) => {}
            }
        }

        stage.enter(Stage::Archiving);
        if successes.is_empty() {
            warn!(
                failed = partial_failures.len(),
                "none of the matched objects could be fetched"
            );
            return Ok(RunOutcome::NoItems);
        }
        if !partial_failures.is_empty() {
            warn!(
                fetched = successes.len(),
                failed = partial_failures.len(),
                error_kind = %ErrorKind::PartialFetchFailure,
                "bundling the objects that could be fetched"
            );
        }
        let artifact = archive::build(
            request.lookup.label(),
            self.clock.as_ref(),
            &successes,
            &staging,
        )
        .await?;
        if cancel.is_cancelled() {
            return Err(BundleError::Cancelled);
        }

        stage.enter(Stage::Publishing);
        let key = self.config.artifact_key(&artifact.name);
        let uri = self
            .store
            .resolve(&key)
            .map_err(|source| BundleError::Publish {
                uri: key.clone(),
                source,
            })?;
        let ttl = request.ttl.unwrap_or_else(|| self.config.url_ttl());
        let grant = cancellable(
            cancel,
            publish::publish(
                self.store.as_ref(),
                &artifact,
                &uri,
                ttl,
                self.clock.as_ref(),
            ),
        )
        .await?;

        if let Err(e) = staging.close() {
            warn!("failed to remove staging area: {}", e);
        }

        Ok(RunOutcome::Published {
            grant,
            artifact: Some(ArtifactSummary {
                name: artifact.name,
                uri,
                size_bytes: artifact.size_bytes,
                manifest: artifact.manifest,
            }),
            partial_failures,
        })
    }

    async fn share(
        &self,
        id: &str,
        ttl: Duration,
        cancel: &CancellationToken,
        stage: &StageTracker,
    ) -> BundleResult<RunOutcome> {
        stage.enter(Stage::Querying);
        let found = cancellable(cancel, async {
            self.index.get_by_id(id).await.map_err(BundleError::from)
        })
        .await?;
        let Some(record) = found else {
            info!("no record with this id");
            return Ok(RunOutcome::NoItems);
        };

        stage.enter(Stage::Publishing);
        let uri = self
            .store
            .resolve(&record.object_ref)
            .map_err(|e| BundleError::from_read(&record.object_ref, e))?;
        let stored = cancellable(cancel, async {
            self.store
                .exists(&uri)
                .await
                .map_err(|e| BundleError::from_read(&record.object_ref, e))
        })
        .await?;
        if !stored {
            return Err(BundleError::ObjectNotFound {
                object_ref: record.object_ref,
                source: BlobError::NotFound { uri },
            });
        }

        let grant = cancellable(
            cancel,
            publish::mint_access_grant(self.store.as_ref(), &uri, ttl, self.clock.as_ref()),
        )
        .await?;
        Ok(RunOutcome::Published {
            grant,
            artifact: None,
            partial_failures: Vec::new(),
        })
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = BundleResult<T>>,
) -> BundleResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BundleError::Cancelled),
        result = fut => result,
    }
}

/// Turn whatever a run produced, panics included, into a [`RunOutcome`].
async fn guarded(
    stage: &StageTracker,
    run: impl Future<Output = BundleResult<RunOutcome>>,
) -> RunOutcome {
    let outcome = match AssertUnwindSafe(run).catch_unwind().await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(BundleError::EmptyArchive)) => RunOutcome::NoItems,
        Ok(Err(err)) => RunOutcome::failed(stage.current(), err.kind(), err.to_string()),
        Err(panic) => RunOutcome::failed(
            stage.current(),
            ErrorKind::Internal,
            panic_message(panic.as_ref()),
        ),
    };

    match &outcome {
        RunOutcome::Published {
            artifact,
            partial_failures,
            ..
        } => info!(
            artifact = artifact.as_ref().map(|a| a.name.as_str()),
            partial_failures = partial_failures.len(),
            "run published"
        ),
        RunOutcome::NoItems => info!("run finished with nothing to publish"),
        RunOutcome::Failed {
            stage,
            error_kind,
            message,
        } => error!(%stage, %error_kind, "run failed: {}", message),
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}
