//! Version reconciliation between a local cache and the server.
//!
//! A reconciliation pass runs in four steps:
//! 1. Skip entirely if the resource was checked within the debounce window.
//! 2. Record the check time *before* any network call, so a burst of
//!    triggers (rapid navigation) issues a single request.
//! 3. Ask the version oracle for the resource's current stamp.
//! 4. On mismatch, fetch the full resource and store it with a version
//!    derived from the payload itself.
//!
//! Nothing here returns an error: every failure degrades to "keep using the
//! cached copy" and is logged.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::api::{ApiError, SiteApi};
use crate::cache::CacheStore;
use crate::models::todo::latest_update;
use crate::models::{CachedProfile, ResourceKind, SiteConfig, Todo};
use crate::utils::{now_ms, stamp_or_now};

/// Minimum interval between two oracle round-trips for the same resource.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(30 * 60);

/// How a reconciliation pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Checked too recently; the cache is trusted without asking.
    Debounced,
    /// The server's stamp equals ours.
    Matched,
    /// Stamps differed and the resource was refetched.
    Refetched { version: String },
    /// The version oracle could not be reached.
    OracleUnavailable,
    /// Stamps differed but the full fetch failed; the old cache stays.
    FetchFailed,
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Debounced => f.write_str("debounced"),
            ReconcileOutcome::Matched => f.write_str("up to date"),
            ReconcileOutcome::Refetched { version } => write!(f, "refetched (version {})", version),
            ReconcileOutcome::OracleUnavailable => f.write_str("version check failed"),
            ReconcileOutcome::FetchFailed => f.write_str("refetch failed"),
        }
    }
}

/// A cached resource type: how to fetch it and how to stamp what was fetched.
pub trait Resource: Send + Sync + 'static {
    /// What the cache stores.
    type Data: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// What the full fetch returns.
    type Payload: Send + 'static;

    const KIND: ResourceKind;

    fn fetch(api: &dyn SiteApi) -> BoxFuture<'_, Result<Self::Payload, ApiError>>;

    /// Split a payload into cacheable data and its modification time.
    fn split(payload: Self::Payload) -> (Self::Data, Option<DateTime<Utc>>);
}

pub struct ProfileResource;

impl Resource for ProfileResource {
    type Data = CachedProfile;
    type Payload = crate::models::ProfileDocument;

    const KIND: ResourceKind = ResourceKind::Profile;

    fn fetch(api: &dyn SiteApi) -> BoxFuture<'_, Result<Self::Payload, ApiError>> {
        api.fetch_profile()
    }

    fn split(payload: Self::Payload) -> (Self::Data, Option<DateTime<Utc>>) {
        let updated_at = payload.updated_at;
        (CachedProfile::from(payload), updated_at)
    }
}

pub struct TodosResource;

impl Resource for TodosResource {
    type Data = Vec<Todo>;
    type Payload = Vec<Todo>;

    const KIND: ResourceKind = ResourceKind::Todos;

    fn fetch(api: &dyn SiteApi) -> BoxFuture<'_, Result<Self::Payload, ApiError>> {
        api.fetch_todos()
    }

    fn split(payload: Self::Payload) -> (Self::Data, Option<DateTime<Utc>>) {
        let updated_at = latest_update(&payload);
        (payload, updated_at)
    }
}

pub struct ConfigResource;

impl Resource for ConfigResource {
    type Data = SiteConfig;
    type Payload = SiteConfig;

    const KIND: ResourceKind = ResourceKind::Config;

    fn fetch(api: &dyn SiteApi) -> BoxFuture<'_, Result<Self::Payload, ApiError>> {
        api.fetch_config()
    }

    fn split(payload: Self::Payload) -> (Self::Data, Option<DateTime<Utc>>) {
        let updated_at = payload.updated_at;
        (payload, updated_at)
    }
}

/// Type-erased reconciliation, so every resource can be driven uniformly.
pub trait Reconcile: Send + Sync {
    fn kind(&self) -> ResourceKind;
    fn reconcile(&self) -> BoxFuture<'_, ReconcileOutcome>;
    fn force_refresh(&self) -> BoxFuture<'_, ReconcileOutcome>;
}

/// Reconciliation routine for one resource.
pub struct Reconciler<R: Resource> {
    store: Arc<CacheStore<R::Data>>,
    api: Arc<dyn SiteApi>,
    window: Duration,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Reconciler<R> {
    pub fn new(store: Arc<CacheStore<R::Data>>, api: Arc<dyn SiteApi>, window: Duration) -> Self {
        Self {
            store,
            api,
            window,
            _resource: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore<R::Data>> {
        &self.store
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Run one debounced reconciliation pass.
    pub async fn run(&self) -> ReconcileOutcome {
        let kind = R::KIND;
        let now = now_ms();

        let elapsed = self.store.snapshot().since_checked(now);
        if elapsed < self.window_ms() {
            debug!(resource = %kind, elapsed_ms = elapsed, "Version check not due, using cache");
            return ReconcileOutcome::Debounced;
        }

        // Claim this window before suspending on the network
        self.store.touch_checked_at(now);

        let snapshot = match self.api.fetch_versions().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(resource = %kind, error = %e, "Version check failed, keeping cache");
                return ReconcileOutcome::OracleUnavailable;
            }
        };

        let server_version = snapshot.get(kind);
        if self.store.snapshot().matches_version(server_version) {
            debug!(resource = %kind, version = %server_version, "Cache is current");
            return ReconcileOutcome::Matched;
        }

        info!(
            resource = %kind,
            local = %self.store.version(),
            server = %server_version,
            "Version changed, refetching"
        );
        self.refetch().await
    }

    /// Fetch the full resource now, ignoring the debounce window, then reset
    /// the window.
    pub async fn run_forced(&self) -> ReconcileOutcome {
        let outcome = self.refetch().await;
        self.store.touch_checked_now();
        outcome
    }

    async fn refetch(&self) -> ReconcileOutcome {
        let kind = R::KIND;
        match R::fetch(self.api.as_ref()).await {
            Ok(payload) => {
                let (data, updated_at) = R::split(payload);
                let version = stamp_or_now(updated_at);
                self.store.replace(data, version.clone());
                debug!(resource = %kind, version = %version, "Cache refreshed");
                ReconcileOutcome::Refetched { version }
            }
            Err(e) => {
                warn!(resource = %kind, error = %e, "Refetch failed, keeping stale cache");
                ReconcileOutcome::FetchFailed
            }
        }
    }
}

impl<R: Resource> Reconcile for Reconciler<R> {
    fn kind(&self) -> ResourceKind {
        R::KIND
    }

    fn reconcile(&self) -> BoxFuture<'_, ReconcileOutcome> {
        self.run().boxed()
    }

    fn force_refresh(&self) -> BoxFuture<'_, ReconcileOutcome> {
        self.run_forced().boxed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Profile, ProfileDocument};
    use crate::storage::{MemoryStorage, StorageBus};
    use crate::testing::FakeApi;
    use chrono::TimeZone;

    const THIRTY_ONE_MINUTES_MS: i64 = 31 * 60 * 1000;

    fn at(ms: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_millis_opt(ms).unwrap())
    }

    fn todo(id: &str, updated_ms: i64) -> Todo {
        Todo {
            server_id: Some(id.to_string()),
            text: id.to_string(),
            updated_at: at(updated_ms),
            ..Default::default()
        }
    }

    fn todos_setup() -> (Arc<FakeApi>, Arc<CacheStore<Vec<Todo>>>, Reconciler<TodosResource>) {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(CacheStore::new("todos", Arc::new(MemoryStorage::new()), StorageBus::new()));
        let reconciler = Reconciler::<TodosResource>::new(store.clone(), api.clone(), DEFAULT_DEBOUNCE_WINDOW);
        (api, store, reconciler)
    }

    /// Seed the store as if it was last checked long enough ago.
    fn seed(store: &CacheStore<Vec<Todo>>, todos: Vec<Todo>, version: &str) {
        store.replace(todos, version.to_string());
        store.touch_checked_at(now_ms() - THIRTY_ONE_MINUTES_MS);
    }

    #[tokio::test]
    async fn test_debounce_holds() {
        let (api, store, reconciler) = todos_setup();
        store.replace(vec![todo("a", 100)], "100".to_string());
        store.touch_checked_now();
        api.set_versions("0", "200", "0");
        api.set_todos(Some(vec![todo("b", 200)]));

        let before = store.snapshot();
        assert_eq!(reconciler.run().await, ReconcileOutcome::Debounced);
        assert_eq!(api.total_calls(), 0);
        assert_eq!(store.data(), before.data);
        assert_eq!(store.version(), before.version);
    }

    #[tokio::test]
    async fn test_debounce_expires_after_window() {
        let (api, store, reconciler) = todos_setup();
        store.replace(vec![todo("a", 100)], "100".to_string());
        store.touch_checked_at(now_ms() - (29 * 60 * 1000));
        api.set_versions("0", "100", "0");
        assert_eq!(reconciler.run().await, ReconcileOutcome::Debounced);

        store.touch_checked_at(now_ms() - THIRTY_ONE_MINUTES_MS);
        assert_eq!(reconciler.run().await, ReconcileOutcome::Matched);
        assert_eq!(api.count("fetch_versions"), 1);
    }

    #[tokio::test]
    async fn test_mismatch_triggers_single_refetch() {
        let (api, store, reconciler) = todos_setup();
        seed(&store, vec![todo("a", 100)], "100");
        api.set_versions("0", "200", "0");
        api.set_todos(Some(vec![todo("a", 100), todo("b", 200)]));

        let outcome = reconciler.run().await;
        assert_eq!(outcome, ReconcileOutcome::Refetched { version: "200".to_string() });
        assert_eq!(api.count("fetch_todos"), 1);
        assert_eq!(store.version(), "200");
        assert_eq!(store.data().len(), 2);
    }

    #[tokio::test]
    async fn test_version_comes_from_payload_not_oracle() {
        let (api, store, reconciler) = todos_setup();
        seed(&store, vec![], "100");
        // Oracle saw one state, the full fetch observed a newer one
        api.set_versions("0", "200", "0");
        api.set_todos(Some(vec![todo("c", 250)]));

        reconciler.run().await;
        assert_eq!(store.version(), "250");
    }

    #[tokio::test]
    async fn test_match_is_noop_but_records_check() {
        let (api, store, reconciler) = todos_setup();
        seed(&store, vec![todo("a", 100)], "100");
        let checked_before = store.last_checked_at();
        api.set_versions("0", "100", "0");
        api.set_todos(Some(vec![todo("z", 999)]));

        assert_eq!(reconciler.run().await, ReconcileOutcome::Matched);
        assert_eq!(api.count("fetch_todos"), 0);
        assert!(store.last_checked_at() > checked_before);
        assert_eq!(store.version(), "100");
        assert_eq!(store.data(), vec![todo("a", 100)]);
    }

    #[tokio::test]
    async fn test_empty_version_always_refetches() {
        let (api, store, reconciler) = todos_setup();
        api.set_versions("0", "0", "0");
        api.set_todos(Some(vec![]));

        let outcome = reconciler.run().await;
        assert!(matches!(outcome, ReconcileOutcome::Refetched { .. }));
        assert_eq!(api.count("fetch_todos"), 1);
        // Empty list carries no stamp, so the version falls back to now
        assert!(store.version().parse::<i64>().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_intact() {
        let (api, store, reconciler) = todos_setup();
        seed(&store, vec![todo("a", 100)], "100");
        api.set_versions("0", "200", "0");
        api.set_todos(None);

        let before = store.snapshot();
        assert_eq!(reconciler.run().await, ReconcileOutcome::FetchFailed);
        assert_eq!(store.data(), before.data);
        assert_eq!(store.version(), before.version);
        // The check itself still counts against the debounce window
        assert!(store.last_checked_at() > before.last_checked_at);
    }

    #[tokio::test]
    async fn test_oracle_failure_keeps_cache_and_skips_fetch() {
        let (api, store, reconciler) = todos_setup();
        seed(&store, vec![todo("a", 100)], "100");
        api.set_todos(Some(vec![todo("b", 200)]));

        assert_eq!(reconciler.run().await, ReconcileOutcome::OracleUnavailable);
        assert_eq!(api.count("fetch_todos"), 0);
        assert_eq!(store.version(), "100");

        // The attempt still counts toward the debounce window
        assert!(store.snapshot().since_checked(now_ms()) < 5_000);
        assert_eq!(reconciler.run().await, ReconcileOutcome::Debounced);
        assert_eq!(api.count("fetch_versions"), 1);
    }

    #[tokio::test]
    async fn test_burst_of_triggers_issues_one_check() {
        let (api, store, reconciler) = todos_setup();
        seed(&store, vec![todo("a", 100)], "100");
        api.set_versions("0", "100", "0");

        let (a, b, c) = tokio::join!(reconciler.run(), reconciler.run(), reconciler.run());
        let outcomes = [a, b, c];
        assert_eq!(api.count("fetch_versions"), 1);
        assert_eq!(outcomes.iter().filter(|o| **o == ReconcileOutcome::Debounced).count(), 2);
    }

    #[tokio::test]
    async fn test_forced_refresh_ignores_debounce_and_resets_window() {
        let (api, store, reconciler) = todos_setup();
        store.replace(vec![], "100".to_string());
        store.touch_checked_at(0);
        api.set_todos(Some(vec![todo("n", 500)]));

        let outcome = reconciler.run_forced().await;
        assert_eq!(outcome, ReconcileOutcome::Refetched { version: "500".to_string() });
        assert_eq!(api.count("fetch_versions"), 0);
        assert!(now_ms() - store.last_checked_at() < 5_000);
    }

    #[tokio::test]
    async fn test_profile_version_from_updated_at() {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(CacheStore::new("profile", Arc::new(MemoryStorage::new()), StorageBus::new()));
        let reconciler = Reconciler::<ProfileResource>::new(store.clone(), api.clone(), DEFAULT_DEBOUNCE_WINDOW);
        api.set_versions("1714550400000", "0", "0");
        api.set_profile(Some(ProfileDocument {
            profile: Profile {
                name: "Yulong".to_string(),
                ..Default::default()
            },
            timeline: vec![],
            updated_at: at(1_714_550_400_000),
        }));

        let outcome = reconciler.run().await;
        assert_eq!(outcome, ReconcileOutcome::Refetched { version: "1714550400000".to_string() });
        assert_eq!(store.data().profile.name, "Yulong");

        // A second, non-debounced pass now matches
        store.touch_checked_at(0);
        assert_eq!(reconciler.run().await, ReconcileOutcome::Matched);
        assert_eq!(api.count("fetch_profile"), 1);
    }

    #[tokio::test]
    async fn test_config_through_trait_object() {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(CacheStore::new("config", Arc::new(MemoryStorage::new()), StorageBus::new()));
        let reconciler: Arc<dyn Reconcile> =
            Arc::new(Reconciler::<ConfigResource>::new(store.clone(), api.clone(), DEFAULT_DEBOUNCE_WINDOW));
        api.set_versions("0", "0", "1704164645000");
        api.set_config(Some(SiteConfig {
            github_token: Some("t".to_string()),
            updated_at: at(1_704_164_645_000),
            ..Default::default()
        }));

        assert_eq!(reconciler.kind(), ResourceKind::Config);
        let outcome = reconciler.reconcile().await;
        assert_eq!(outcome, ReconcileOutcome::Refetched { version: "1704164645000".to_string() });
        assert_eq!(store.data().github_token(), "t");
    }
}
