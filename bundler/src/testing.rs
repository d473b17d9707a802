use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use blob_store::{BlobError, BlobMetadata, BlobResult, BlobStore};
use data_model::LookupRecord;
use lookup_index::{LookupError, LookupIndex, LookupResult};

const SCHEME: &str = "mem://";

/// Object store held in memory, with switches to make operations fail.
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failing_gets: Mutex<HashSet<String>>,
    panicking_gets: Mutex<HashSet<String>>,
    fail_uploads: AtomicBool,
    fail_presign: AtomicBool,
    get_delay: Option<Duration>,
    calls: AtomicUsize,
    presign_calls: AtomicUsize,
    in_flight_gets: AtomicUsize,
    max_in_flight_gets: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    fn uri(key: &str) -> String {
        if key.starts_with(SCHEME) {
            key.to_string()
        } else {
            format!("{}{}", SCHEME, key.trim_start_matches('/'))
        }
    }

    pub fn insert(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(Self::uri(key), data);
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(&Self::uri(key)).cloned()
    }

    pub fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn fail_get(&self, key: &str) {
        self.failing_gets.lock().unwrap().insert(Self::uri(key));
    }

    pub fn panic_on_get(&self, key: &str) {
        self.panicking_gets.lock().unwrap().insert(Self::uri(key));
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn fail_presign(&self) {
        self.fail_presign.store(true, Ordering::SeqCst);
    }

    /// Every trait call made so far, `resolve` excluded.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn presign_calls(&self) -> usize {
        self.presign_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_gets(&self) -> usize {
        self.max_in_flight_gets.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, uri: &str) -> BlobResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight_gets.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight_gets);
        self.max_in_flight_gets.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking_gets.lock().unwrap().contains(uri) {
            panic!("object store client bug for {}", uri);
        }
        if self.failing_gets.lock().unwrap().contains(uri) {
            return Err(BlobError::NetworkError {
                source: anyhow!("connection reset reading {}", uri),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or_else(|| BlobError::NotFound {
                uri: uri.to_string(),
            })
    }

    async fn get_metadata(&self, uri: &str) -> BlobResult<BlobMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(uri)
            .map(|data| BlobMetadata::with_size(data.len() as u64))
            .ok_or_else(|| BlobError::NotFound {
                uri: uri.to_string(),
            })
    }

    fn resolve(&self, reference: &str) -> BlobResult<String> {
        if reference.is_empty() {
            return Err(BlobError::InvalidUri {
                uri: reference.to_string(),
                reason: "empty object key".to_string(),
            });
        }
        Ok(Self::uri(reference))
    }

    async fn upload(&self, uri: &str, data: Vec<u8>) -> BlobResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::NetworkError {
                source: anyhow!("upload rejected"),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .insert(uri.to_string(), data);
        Ok(())
    }

    async fn presign_get_uri(&self, uri: &str, expires_in: Duration) -> BlobResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.presign_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_presign.load(Ordering::SeqCst) {
            return Err(BlobError::PresignError {
                reason: "credentials expired".to_string(),
            });
        }
        blob_store::validate_expiry(expires_in)
            .map_err(|reason| BlobError::PresignError { reason })?;
        let key = uri.strip_prefix(SCHEME).unwrap_or(uri);
        Ok(format!(
            "https://blobs.example.com/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }
}

/// Lookup table held in memory.
#[derive(Default)]
pub struct InMemoryLookupIndex {
    records: Vec<LookupRecord>,
    unavailable: bool,
}

impl InMemoryLookupIndex {
    pub fn new(records: Vec<LookupRecord>) -> Self {
        Self {
            records,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            records: Vec::new(),
            unavailable: true,
        }
    }

    fn check(&self) -> LookupResult<()> {
        if self.unavailable {
            return Err(LookupError::unavailable(anyhow!("connection timed out")));
        }
        Ok(())
    }
}

#[async_trait]
impl LookupIndex for InMemoryLookupIndex {
    async fn query_by_tag(&self, tag: &str) -> LookupResult<Vec<LookupRecord>> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .filter(|r| r.tag == tag)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> LookupResult<Option<LookupRecord>> {
        self.check()?;
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }
}
