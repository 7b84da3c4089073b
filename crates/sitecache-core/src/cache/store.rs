use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::storage::{DurableStorage, StorageBus, StorageEvent, WriterId};
use crate::utils::now_ms;

use super::CachedResource;

/// One resource's cache: in-memory state mirrored into durable storage.
///
/// Every operation is infallible from the caller's point of view. Storage
/// and decoding failures are logged and the in-memory state stays usable.
pub struct CacheStore<T> {
    name: &'static str,
    state: RwLock<CachedResource<T>>,
    storage: Arc<dyn DurableStorage>,
    bus: StorageBus,
    writer: WriterId,
}

impl<T> CacheStore<T>
where
    T: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(name: &'static str, storage: Arc<dyn DurableStorage>, bus: StorageBus) -> Self {
        Self {
            name,
            state: RwLock::new(CachedResource::default()),
            storage,
            bus,
            writer: WriterId::next(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn data_key(&self) -> String {
        format!("{}_data", self.name)
    }

    pub fn version_key(&self) -> String {
        format!("{}_version", self.name)
    }

    pub fn checked_key(&self) -> String {
        format!("{}_last_version_check", self.name)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CachedResource<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CachedResource<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Accessors =====

    pub fn snapshot(&self) -> CachedResource<T> {
        self.read_state().clone()
    }

    pub fn data(&self) -> T {
        self.read_state().data.clone()
    }

    /// Borrow the data without cloning it.
    pub fn with_data<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.read_state().data)
    }

    pub fn version(&self) -> String {
        self.read_state().version.clone()
    }

    pub fn last_checked_at(&self) -> i64 {
        self.read_state().last_checked_at
    }

    // ===== Durable storage =====

    /// Load the durable copy into memory.
    ///
    /// A missing or undecodable data entry resets the store to defaults; the
    /// stored version and check time are only trusted alongside valid data.
    pub fn load_from_durable(&self) {
        let data = match self.read_key(&self.data_key()) {
            Some(raw) => match serde_json::from_str::<T>(&raw) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(resource = self.name, error = %e, "Discarding malformed cached data");
                    None
                }
            },
            None => None,
        };

        let Some(data) = data else {
            *self.write_state() = CachedResource::default();
            debug!(resource = self.name, "No usable durable cache, starting empty");
            return;
        };

        let version = self.read_key(&self.version_key()).unwrap_or_default();
        let last_checked_at = self
            .read_key(&self.checked_key())
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0);

        debug!(resource = self.name, version = %version, last_checked_at, "Loaded cache from durable storage");
        *self.write_state() = CachedResource {
            data,
            version,
            last_checked_at,
        };
    }

    /// Write the current in-memory state to durable storage.
    pub fn persist(&self) {
        let snapshot = self.snapshot();
        match serde_json::to_string(&snapshot.data) {
            Ok(json) => self.write_key(&self.data_key(), &json),
            Err(e) => warn!(resource = self.name, error = %e, "Failed to serialize cached data"),
        }
        self.write_key(&self.version_key(), &snapshot.version);
        self.write_key(&self.checked_key(), &snapshot.last_checked_at.to_string());
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(resource = self.name, key, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    fn write_key(&self, key: &str, value: &str) {
        match self.storage.set(key, value) {
            Ok(()) => self.bus.publish(StorageEvent {
                key: key.to_string(),
                value: Some(value.to_string()),
                origin: self.writer,
            }),
            Err(e) => warn!(resource = self.name, key, error = %e, "Failed to persist cache entry"),
        }
    }

    fn remove_key(&self, key: &str) {
        match self.storage.remove(key) {
            Ok(()) => self.bus.publish(StorageEvent {
                key: key.to_string(),
                value: None,
                origin: self.writer,
            }),
            Err(e) => warn!(resource = self.name, key, error = %e, "Failed to remove cache entry"),
        }
    }

    // ===== Mutations =====

    /// Set data and its version together, then persist.
    pub fn replace(&self, data: T, version: String) {
        {
            let mut state = self.write_state();
            state.data = data;
            state.version = version;
        }
        self.persist();
    }

    /// Record a reconciliation attempt now.
    pub fn touch_checked_now(&self) {
        self.touch_checked_at(now_ms());
    }

    pub fn touch_checked_at(&self, at: i64) {
        self.write_state().last_checked_at = at;
        self.write_key(&self.checked_key(), &at.to_string());
    }

    /// Change data in memory only. Used for optimistic updates that may still
    /// be rolled back.
    pub fn update_data<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.write_state().data)
    }

    /// Stamp the current data as a local edit (version = now) and persist.
    pub fn commit_local(&self) {
        self.write_state().version = now_ms().to_string();
        self.persist();
    }

    /// `update_data` followed by `commit_local`.
    pub fn mutate_local<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = self.update_data(f);
        self.commit_local();
        result
    }

    /// Drop the cached copy everywhere, forcing a clean refetch.
    pub fn clear(&self) {
        *self.write_state() = CachedResource::default();
        self.remove_key(&self.data_key());
        self.remove_key(&self.version_key());
        self.remove_key(&self.checked_key());
        debug!(resource = self.name, "Cache cleared");
    }

    // ===== External changes =====

    /// Apply a write made by another store sharing the same storage.
    /// Returns whether in-memory state changed.
    pub fn apply_external(&self, event: &StorageEvent) -> bool {
        if event.origin == self.writer {
            return false;
        }

        if event.key == self.data_key() {
            let data = match event.value.as_deref() {
                Some(raw) => match serde_json::from_str::<T>(raw) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(resource = self.name, error = %e, "Ignoring malformed external cache write");
                        return false;
                    }
                },
                None => T::default(),
            };
            self.write_state().data = data;
        } else if event.key == self.version_key() {
            self.write_state().version = event.value.clone().unwrap_or_default();
        } else if event.key == self.checked_key() {
            self.write_state().last_checked_at = event
                .value
                .as_deref()
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(0);
        } else {
            return false;
        }

        trace!(resource = self.name, key = %event.key, "Applied external cache write");
        true
    }

    /// Follow the bus in the background, applying other writers' changes.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let store = Arc::downgrade(self);
        let name = self.name;

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match store.upgrade() {
                        Some(store) => {
                            store.apply_external(&event);
                        }
                        None => break,
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(resource = name, skipped, "Cache listener lagged, reloading from storage");
                        match store.upgrade() {
                            Some(store) => store.load_from_durable(),
                            None => break,
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            trace!(resource = name, "Cache listener stopped");
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
