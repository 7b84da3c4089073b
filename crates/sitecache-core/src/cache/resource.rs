use serde::{Deserialize, Serialize};

/// In-memory state of one cached resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedResource<T> {
    pub data: T,
    /// Version stamp of `data`. Empty means never fetched.
    pub version: String,
    /// Epoch ms of the last reconciliation attempt; debounce only.
    pub last_checked_at: i64,
}

impl<T> CachedResource<T> {
    pub fn has_version(&self) -> bool {
        !self.version.is_empty()
    }

    /// Milliseconds since the last reconciliation attempt.
    pub fn since_checked(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.last_checked_at)
    }

    /// Whether the local stamp agrees with the server's. An empty local
    /// stamp never matches, not even the server's `"0"`.
    pub fn matches_version(&self, server: &str) -> bool {
        self.has_version() && self.version == server
    }
}
