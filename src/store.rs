//! Key-value persistence with two scopes.
//!
//! `Sync` holds small, user-authored data (watched sites, settings) and is
//! accounted against a quota; `Local` holds check state and feed state and is
//! unbounded. Values are JSON.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{Error, Result};

/// Total bytes of the synced scope.
pub const SYNC_QUOTA_BYTES: usize = 102_400;

/// Usage fraction that triggers a warning.
pub const SYNC_WARNING_THRESHOLD: f64 = 0.80;

/// Usage fraction at which writes are refused.
pub const SYNC_BLOCK_THRESHOLD: f64 = 0.95;

/// Storage scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreScope {
    /// Small, quota-bound, synced across devices.
    Sync,
    /// Unbounded, this machine only.
    Local,
}

impl StoreScope {
    fn file_name(self) -> &'static str {
        match self {
            Self::Sync => "sync.json",
            Self::Local => "local.json",
        }
    }
}

/// Async JSON key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, scope: StoreScope, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, scope: StoreScope, key: &str, value: Value) -> Result<()>;

    /// Delete a value. Missing keys are not an error.
    async fn remove(&self, scope: StoreScope, key: &str) -> Result<()>;

    /// Bytes used by a scope (key length plus serialized value length).
    async fn bytes_in_use(&self, scope: StoreScope) -> Result<usize>;
}

/// Read and deserialize a value.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    scope: StoreScope,
    key: &str,
) -> Result<Option<T>> {
    match store.get(scope, key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and write a value.
pub async fn set_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    scope: StoreScope,
    key: &str,
    value: &T,
) -> Result<()> {
    store.set(scope, key, serde_json::to_value(value)?).await
}

type ScopeMap = BTreeMap<String, Value>;

fn bytes_of(map: &ScopeMap) -> usize {
    map.iter()
        .map(|(key, value)| key.len() + value.to_string().len())
        .sum()
}

/// Refuse a synced write that would exceed the quota.
fn check_hard_quota(map: &ScopeMap, key: &str, value: &Value, quota: usize) -> Result<()> {
    let current = bytes_of(map);
    let replaced = map.get(key).map_or(0, |old| key.len() + old.to_string().len());
    let after = current - replaced + key.len() + value.to_string().len();
    if after > quota {
        return Err(Error::QuotaExceeded {
            bytes_in_use: current,
            quota,
            percentage: after as f64 / quota as f64 * 100.0,
        });
    }
    Ok(())
}

/// In-memory store, mainly for tests and dry runs.
#[derive(Debug)]
pub struct MemoryStore {
    scopes: RwLock<HashMap<StoreScope, ScopeMap>>,
    sync_quota: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store with the standard sync quota.
    #[must_use]
    pub fn new() -> Self {
        Self::with_sync_quota(SYNC_QUOTA_BYTES)
    }

    /// Empty store with a custom sync quota.
    #[must_use]
    pub fn with_sync_quota(sync_quota: usize) -> Self {
        Self { scopes: RwLock::new(HashMap::new()), sync_quota }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, scope: StoreScope, key: &str) -> Result<Option<Value>> {
        Ok(self.scopes.read().await.get(&scope).and_then(|m| m.get(key)).cloned())
    }

    async fn set(&self, scope: StoreScope, key: &str, value: Value) -> Result<()> {
        let mut scopes = self.scopes.write().await;
        let map = scopes.entry(scope).or_default();
        if scope == StoreScope::Sync {
            check_hard_quota(map, key, &value, self.sync_quota)?;
        }
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, scope: StoreScope, key: &str) -> Result<()> {
        if let Some(map) = self.scopes.write().await.get_mut(&scope) {
            map.remove(key);
        }
        Ok(())
    }

    async fn bytes_in_use(&self, scope: StoreScope) -> Result<usize> {
        Ok(self.scopes.read().await.get(&scope).map_or(0, bytes_of))
    }
}

/// File-backed store: one JSON object per scope under a data directory.
///
/// Nothing is cached. Every read loads the scope file and every write is a
/// read-modify-write of it, so several `catchup` processes sharing one data
/// directory see each other's changes. Writes go to a temp file in the same
/// directory that is renamed over the scope file; a crash leaves either the
/// old or the new file. Operations within one process are serialized.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    io_lock: Mutex<()>,
    sync_quota: usize,
}

impl JsonFileStore {
    /// Open (creating if needed) the store in `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let store = Self { dir, io_lock: Mutex::new(()), sync_quota: SYNC_QUOTA_BYTES };

        // Surface corrupt files at open time rather than on first use.
        for scope in [StoreScope::Sync, StoreScope::Local] {
            store.load(scope).await?;
        }
        debug!(dir = %store.dir.display(), "opened json store");
        Ok(store)
    }

    /// Directory holding the scope files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, scope: StoreScope) -> PathBuf {
        self.dir.join(scope.file_name())
    }

    async fn load(&self, scope: StoreScope) -> Result<ScopeMap> {
        match tokio::fs::read(self.path_of(scope)).await {
            Ok(bytes) if bytes.is_empty() => Ok(ScopeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ScopeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, scope: StoreScope, map: &ScopeMap) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        let dir = self.dir.clone();
        let path = self.path_of(scope);
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::StorageError(format!("store writer failed: {e}")))??;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, scope: StoreScope, key: &str) -> Result<Option<Value>> {
        let _io = self.io_lock.lock().await;
        Ok(self.load(scope).await?.remove(key))
    }

    async fn set(&self, scope: StoreScope, key: &str, value: Value) -> Result<()> {
        let _io = self.io_lock.lock().await;
        let mut map = self.load(scope).await?;
        if scope == StoreScope::Sync {
            check_hard_quota(&map, key, &value, self.sync_quota)?;
        }
        map.insert(key.to_string(), value);
        self.persist(scope, &map).await
    }

    async fn remove(&self, scope: StoreScope, key: &str) -> Result<()> {
        let _io = self.io_lock.lock().await;
        let mut map = self.load(scope).await?;
        if map.remove(key).is_some() {
            self.persist(scope, &map).await?;
        }
        Ok(())
    }

    async fn bytes_in_use(&self, scope: StoreScope) -> Result<usize> {
        let _io = self.io_lock.lock().await;
        Ok(bytes_of(&self.load(scope).await?))
    }
}

/// Snapshot of the synced scope's quota usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    /// Bytes used.
    pub bytes_in_use: usize,
    /// Quota.
    pub total_bytes: usize,
    /// Usage in percent, one decimal.
    pub percentage: f64,
    /// Bytes left.
    pub remaining_bytes: usize,
    /// At or above the warning threshold.
    pub is_warning: bool,
    /// At or above the block threshold.
    pub is_blocked: bool,
}

/// Quota accounting for the synced scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncQuota {
    /// Total bytes.
    pub quota: usize,
    /// Warning fraction.
    pub warning: f64,
    /// Block fraction.
    pub block: f64,
}

impl Default for SyncQuota {
    fn default() -> Self {
        Self { quota: SYNC_QUOTA_BYTES, warning: SYNC_WARNING_THRESHOLD, block: SYNC_BLOCK_THRESHOLD }
    }
}

impl SyncQuota {
    /// Usage figures for a byte count.
    #[must_use]
    pub fn usage_for(&self, bytes_in_use: usize) -> StorageUsage {
        let percentage = bytes_in_use as f64 / self.quota as f64 * 100.0;
        StorageUsage {
            bytes_in_use,
            total_bytes: self.quota,
            percentage: (percentage * 10.0).round() / 10.0,
            remaining_bytes: self.quota.saturating_sub(bytes_in_use),
            is_warning: percentage >= self.warning * 100.0,
            is_blocked: percentage >= self.block * 100.0,
        }
    }

    /// Current usage of the synced scope.
    pub async fn usage(&self, store: &dyn KeyValueStore) -> Result<StorageUsage> {
        Ok(self.usage_for(store.bytes_in_use(StoreScope::Sync).await?))
    }

    /// Estimated bytes a new entry will take (two bytes per JSON character).
    pub fn estimate<T: Serialize>(entry: &T) -> Result<usize> {
        Ok(serde_json::to_string(entry)?.len() * 2)
    }

    /// Check whether `entry` can be added.
    ///
    /// Returns `Ok(Some(warning))` above the warning threshold and
    /// [`Error::QuotaExceeded`] at or above the block threshold.
    pub async fn preflight<T: Serialize + Sync>(
        &self,
        store: &dyn KeyValueStore,
        entry: &T,
    ) -> Result<Option<String>> {
        let usage = self.usage(store).await?;
        let projected = (usage.bytes_in_use + Self::estimate(entry)?) as f64 / self.quota as f64 * 100.0;

        if projected >= self.block * 100.0 {
            return Err(Error::QuotaExceeded {
                bytes_in_use: usage.bytes_in_use,
                quota: self.quota,
                percentage: usage.percentage,
            });
        }
        if projected >= self.warning * 100.0 {
            return Ok(Some(format!(
                "Storage is at {}%. Remove some sites before it fills up.",
                projected.round()
            )));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_scopes_are_separate() {
        let store = MemoryStore::new();
        store.set(StoreScope::Sync, "k", json!(1)).await.unwrap();
        assert_eq!(store.get(StoreScope::Local, "k").await.unwrap(), None);
        assert_eq!(store.get(StoreScope::Sync, "k").await.unwrap(), Some(json!(1)));
        assert_eq!(store.bytes_in_use(StoreScope::Sync).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sync_writes_over_quota_rejected() {
        let store = MemoryStore::with_sync_quota(10);
        let err = store.set(StoreScope::Sync, "key", json!("a long value")).await.unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { .. }));
        store.set(StoreScope::Local, "key", json!("a long value")).await.unwrap();
    }

    #[test]
    fn usage_thresholds() {
        let quota = SyncQuota::default();
        let usage = quota.usage_for(81_920);
        assert_eq!(usage.percentage, 80.0);
        assert!(usage.is_warning);
        assert!(!usage.is_blocked);
        assert!(quota.usage_for(98_000).is_blocked);
    }

    #[tokio::test]
    async fn preflight_warns_then_blocks() {
        let store = MemoryStore::new();
        let quota = SyncQuota { quota: 1_000, ..SyncQuota::default() };
        // "\"xxxx...\"" of 400 chars -> 402 * 2 bytes
        let entry = "x".repeat(400);
        assert!(matches!(quota.preflight(&store, &entry).await, Ok(Some(_))));
        let entry = "x".repeat(480);
        assert!(matches!(quota.preflight(&store, &entry).await, Err(Error::QuotaExceeded { .. })));
        assert_eq!(quota.preflight(&store, &"small").await.unwrap(), None);
    }

    #[tokio::test]
    async fn json_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.set(StoreScope::Local, "siteStates", json!({"a": 1})).await.unwrap();
            store.set(StoreScope::Sync, "sites", json!([])).await.unwrap();
        }
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get(StoreScope::Local, "siteStates").await.unwrap(), Some(json!({"a": 1})));
        assert!(dir.path().join("sync.json").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn json_file_store_handles_share_one_directory() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = JsonFileStore::open(dir.path()).await.unwrap();
        let cli = JsonFileStore::open(dir.path()).await.unwrap();

        daemon.set(StoreScope::Local, "siteStates", json!({"a": {"newCount": 3}})).await.unwrap();
        cli.set(StoreScope::Sync, "sites", json!([{"url": "a"}])).await.unwrap();
        assert_eq!(daemon.get(StoreScope::Sync, "sites").await.unwrap(), Some(json!([{"url": "a"}])));

        // A mark-read from one handle survives an unrelated write from the other.
        cli.set(StoreScope::Local, "siteStates", json!({"a": {"newCount": 0}})).await.unwrap();
        daemon.set(StoreScope::Local, "rss_feed_states", json!({})).await.unwrap();
        assert_eq!(
            daemon.get(StoreScope::Local, "siteStates").await.unwrap(),
            Some(json!({"a": {"newCount": 0}}))
        );

        cli.remove(StoreScope::Sync, "sites").await.unwrap();
        assert_eq!(daemon.get(StoreScope::Sync, "sites").await.unwrap(), None);
        assert_eq!(daemon.bytes_in_use(StoreScope::Sync).await.unwrap(), 0);
    }
}
