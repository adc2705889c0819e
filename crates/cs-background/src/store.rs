//! Persisted key/value storage
//!
//! [`KeyValueStore`] is the host seam. [`ConfigStore`] reads and writes the
//! configuration record through it: reads never fail (a missing or corrupt
//! field degrades to its default), writes report their error.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::warn;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use cs_core::config::ConfigRecord;

/// Error from the storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous key/value storage provided by the host.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;
    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// =============================================================================
// Configuration Record Access
// =============================================================================

/// The configuration record under one storage key.
pub struct ConfigStore<K> {
    kv: K,
    key: String,
}

impl<K: KeyValueStore> ConfigStore<K> {
    pub fn new(kv: K, key: impl Into<String>) -> Self {
        Self { kv, key: key.into() }
    }

    pub fn backend(&self) -> &K {
        &self.kv
    }

    /// Read the record. Missing or malformed fields take their default
    /// without disturbing the readable ones; unreadable storage yields the
    /// default record.
    pub async fn read(&self) -> ConfigRecord {
        match self.kv.get(&self.key).await {
            Ok(Some(value)) => decode_record(&self.key, value),
            Ok(None) => ConfigRecord::default(),
            Err(e) => {
                warn!("Failed to read config, using defaults: {}", e);
                ConfigRecord::default()
            }
        }
    }

    pub async fn write(&self, record: &ConfigRecord) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.kv.set(&self.key, value).await
    }
}

fn decode_record(key: &str, value: Value) -> ConfigRecord {
    let mut record = ConfigRecord::default();
    let Value::Object(mut map) = value else {
        warn!("Stored config under '{}' is not an object, using defaults", key);
        return record;
    };

    if let Some(enabled) = take_field(key, &mut map, "enabled") {
        record.enabled = enabled;
    }
    if let Some(entries) = take_field::<Vec<Value>>(key, &mut map, "allowlist") {
        record.allowlist = entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::String(site) => Some(site),
                other => {
                    warn!("Dropping non-string allowlist entry under '{}': {}", key, other);
                    None
                }
            })
            .collect();
    }
    if let Some(counts) = take_field(key, &mut map, "counts") {
        record.counts = counts;
    }
    record.normalized()
}

/// One field of the stored object; absent or malformed reads as `None`.
fn take_field<T: DeserializeOwned>(key: &str, map: &mut Map<String, Value>, field: &str) -> Option<T> {
    let value = map.remove(field)?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Stored config field '{}.{}' is corrupt, using its default: {}", key, field, e);
            None
        }
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, Value>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

/// Process-local store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing serialization.
    pub fn insert(&self, key: &str, value: Value) {
        self.lock().entries.insert(key.to_string(), value);
    }

    pub fn raw(&self, key: &str) -> Option<Value> {
        self.lock().entries.get(key).cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        // Suspend like a real host call so concurrent callers interleave
        tokio::task::yield_now().await;
        let state = self.lock();
        if state.fail_reads {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(state.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        state.entries.insert(key.to_string(), value);
        state.writes += 1;
        Ok(())
    }
}

// =============================================================================
// File Store
// =============================================================================

/// Store backed by one JSON object file, `{key: value, ...}`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Map::new()),
            Ok(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => Ok(map),
                _ => Err(StoreError::Unavailable(format!(
                    "'{}' does not hold a JSON object",
                    self.path.display()
                ))),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut map = self.read_map().await?;
        Ok(map.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        // A corrupt file is replaced rather than blocking every write
        let mut map = match self.read_map().await {
            Ok(map) => map,
            Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
            Err(e) => {
                warn!("Replacing unreadable store '{}': {}", self.path.display(), e);
                Map::new()
            }
        };
        map.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let text = serde_json::to_string_pretty(&Value::Object(map))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    const KEY: &str = "cleanstream_state";

    fn temp_path(name: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("cs-store-{}-{}-{}.json", std::process::id(), name, n))
    }

    #[tokio::test]
    async fn missing_record_reads_as_defaults() {
        let store = ConfigStore::new(MemoryStore::new(), KEY);
        assert_eq!(store.read().await, ConfigRecord::default());
    }

    #[tokio::test]
    async fn partial_record_fills_defaults() {
        let kv = MemoryStore::new();
        kv.insert(KEY, json!({ "allowlist": ["HTTPS://News.org/x", "news.org"] }));
        let record = ConfigStore::new(kv, KEY).read().await;
        assert!(record.enabled);
        assert_eq!(record.allowlist, vec!["news.org".to_string()]);
        assert_eq!(record.counts.total, 0);
    }

    #[tokio::test]
    async fn corrupt_record_degrades_to_defaults() {
        let kv = MemoryStore::new();
        kv.insert(KEY, json!({ "enabled": "yes", "counts": { "total": -3 } }));
        assert_eq!(ConfigStore::new(kv, KEY).read().await, ConfigRecord::default());
    }

    #[tokio::test]
    async fn corrupt_field_keeps_readable_fields() {
        let kv = MemoryStore::new();
        kv.insert(
            KEY,
            json!({ "enabled": false, "allowlist": ["News.org", 7], "counts": { "total": -1 } }),
        );
        let record = ConfigStore::new(kv, KEY).read().await;
        assert!(!record.enabled);
        assert_eq!(record.allowlist, vec!["news.org".to_string()]);
        assert_eq!(record.counts.total, 0);
    }

    #[tokio::test]
    async fn non_object_record_degrades_to_defaults() {
        let kv = MemoryStore::new();
        kv.insert(KEY, json!(["news.org"]));
        assert_eq!(ConfigStore::new(kv, KEY).read().await, ConfigRecord::default());
    }

    #[tokio::test]
    async fn read_failure_degrades_to_defaults() {
        let kv = MemoryStore::new();
        kv.insert(KEY, json!({ "enabled": false }));
        kv.set_fail_reads(true);
        assert_eq!(ConfigStore::new(kv, KEY).read().await, ConfigRecord::default());
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let kv = MemoryStore::new();
        kv.set_fail_writes(true);
        let store = ConfigStore::new(kv, KEY);
        assert!(store.write(&ConfigRecord::default()).await.is_err());
    }

    #[tokio::test]
    async fn write_uses_persisted_layout() {
        let kv = MemoryStore::new();
        let store = ConfigStore::new(kv.clone(), KEY);
        let mut record = ConfigRecord::default();
        record.set_site_blocked("ads.example", false);
        record.record_hit();
        store.write(&record).await.unwrap();

        assert_eq!(
            kv.raw(KEY),
            Some(json!({ "enabled": true, "allowlist": ["ads.example"], "counts": { "total": 1 } }))
        );
    }

    #[tokio::test]
    async fn file_store_round_trips_and_keeps_other_keys() {
        let path = temp_path("roundtrip");
        let kv = FileStore::new(&path);
        kv.set("other", json!(42)).await.unwrap();

        let store = ConfigStore::new(kv.clone(), KEY);
        let mut record = ConfigRecord::default();
        record.enabled = false;
        store.write(&record).await.unwrap();

        assert_eq!(store.read().await, record);
        assert_eq!(kv.get("other").await.unwrap(), Some(json!(42)));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn file_store_missing_file_is_empty() {
        let kv = FileStore::new(temp_path("missing"));
        assert_eq!(kv.get(KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_replaces_corrupt_file_on_write() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json").unwrap();
        let kv = FileStore::new(&path);

        assert!(kv.get(KEY).await.is_err());
        assert_eq!(ConfigStore::new(kv.clone(), KEY).read().await, ConfigRecord::default());

        kv.set(KEY, json!({ "enabled": false })).await.unwrap();
        assert_eq!(kv.get(KEY).await.unwrap(), Some(json!({ "enabled": false })));
        let _ = std::fs::remove_file(&path);
    }
}
