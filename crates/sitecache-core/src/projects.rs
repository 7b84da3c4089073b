//! Cached GitHub repositories for the projects page.
//!
//! Unlike the site resources there is no version oracle for GitHub: the list
//! is simply refetched when it is empty or older than an hour. Concurrent
//! callers share one in-flight request.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::api::{ApiError, GithubClient};
use crate::cache::CacheStore;
use crate::models::Project;
use crate::utils::now_ms;

/// Age after which the cached list is refetched.
pub const PROJECTS_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Where repository listings come from.
pub trait ProjectSource: Send + Sync {
    fn fetch_projects<'a>(
        &'a self,
        username: &'a str,
        token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Project>, ApiError>>;
}

impl ProjectSource for GithubClient {
    fn fetch_projects<'a>(
        &'a self,
        username: &'a str,
        token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Project>, ApiError>> {
        GithubClient::fetch_projects(self, username, token).boxed()
    }
}

type FetchResult = Result<Vec<Project>, Arc<ApiError>>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

pub struct ProjectCache {
    store: Arc<CacheStore<Vec<Project>>>,
    source: Arc<dyn ProjectSource>,
    pending: Mutex<Option<(u64, SharedFetch)>>,
    /// Bumped by every new fetch and by `clear`; only the latest fetch may write.
    generation: Arc<AtomicU64>,
}

impl ProjectCache {
    pub fn new(store: Arc<CacheStore<Vec<Project>>>, source: Arc<dyn ProjectSource>) -> Self {
        Self {
            store,
            source,
            pending: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore<Vec<Project>>> {
        &self.store
    }

    pub fn projects(&self) -> Vec<Project> {
        self.store.data()
    }

    /// Every tag in use, sorted.
    pub fn tags(&self) -> Vec<String> {
        self.store.with_data(|projects| {
            let set: BTreeSet<&String> = projects.iter().flat_map(|p| p.tags.iter()).collect();
            set.into_iter().cloned().collect()
        })
    }

    /// Every language in use, sorted.
    pub fn languages(&self) -> Vec<String> {
        self.store.with_data(|projects| {
            let set: BTreeSet<&String> = projects.iter().map(|p| &p.language).collect();
            set.into_iter().cloned().collect()
        })
    }

    pub fn by_tag(&self, tag: &str) -> Vec<Project> {
        self.store
            .with_data(|projects| projects.iter().filter(|p| p.tags.iter().any(|t| t == tag)).cloned().collect())
    }

    pub fn by_language(&self, language: &str) -> Vec<Project> {
        self.store
            .with_data(|projects| projects.iter().filter(|p| p.language == language).cloned().collect())
    }

    /// Empty, or last fetched more than an hour ago.
    pub fn should_refresh(&self) -> bool {
        let snapshot = self.store.snapshot();
        let max_age = PROJECTS_MAX_AGE.as_millis() as i64;
        snapshot.data.is_empty() || snapshot.since_checked(now_ms()) > max_age
    }

    /// Refetch only if the cached list is stale.
    pub async fn ensure_fresh(&self, username: &str, token: Option<&str>) -> FetchResult {
        if self.should_refresh() {
            self.refresh(username, token, false).await
        } else {
            debug!("Project list is fresh, using cache");
            Ok(self.projects())
        }
    }

    /// Fetch the repository list. Without `force`, joins a fetch already in
    /// flight instead of starting another.
    pub async fn refresh(&self, username: &str, token: Option<&str>, force: bool) -> FetchResult {
        if username.trim().is_empty() {
            return Ok(self.projects());
        }

        let (generation, fetch) = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match pending.as_ref() {
                Some((generation, fetch)) if !force => {
                    debug!(username, "Joining in-flight project fetch");
                    (*generation, fetch.clone())
                }
                _ => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let fetch = self.start_fetch(generation, username.to_string(), token.map(str::to_string));
                    *pending = Some((generation, fetch.clone()));
                    (generation, fetch)
                }
            }
        };

        let result = fetch.await;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(pending.as_ref(), Some((g, _)) if *g == generation) {
            *pending = None;
        }
        result
    }

    fn start_fetch(&self, generation: u64, username: String, token: Option<String>) -> SharedFetch {
        let source = self.source.clone();
        let store = self.store.clone();
        let latest = self.generation.clone();
        async move {
            match source.fetch_projects(&username, token.as_deref()).await {
                Ok(projects) => {
                    if latest.load(Ordering::SeqCst) != generation {
                        debug!(username = %username, generation, "Discarding superseded project fetch");
                        return Ok(projects);
                    }
                    info!(username = %username, count = projects.len(), "Project list refreshed");
                    let now = now_ms();
                    store.replace(projects.clone(), now.to_string());
                    store.touch_checked_at(now);
                    Ok(projects)
                }
                Err(e) => {
                    warn!(username = %username, error = %e, "Failed to fetch GitHub repositories");
                    Err(Arc::new(e))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drop the cached list so the next access refetches.
    pub fn clear(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *pending = None;
        self.store.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageBus};
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl ProjectSource for FakeSource {
        fn fetch_projects<'a>(
            &'a self,
            username: &'a str,
            _token: Option<&'a str>,
        ) -> BoxFuture<'a, Result<Vec<Project>, ApiError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let fail = self.fail.load(Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                if fail {
                    return Err(ApiError::NotFound(format!("GitHub user \"{}\"", username)));
                }
                Ok(vec![Project {
                    id: 1,
                    name: format!("repo-{}", call),
                    language: "Rust".to_string(),
                    tags: vec!["Rust".to_string(), "GitHub".to_string()],
                    is_from_github: true,
                    ..Default::default()
                }])
            }
            .boxed()
        }
    }

    fn setup() -> (Arc<FakeSource>, ProjectCache) {
        let source = Arc::new(FakeSource::default());
        let store = Arc::new(CacheStore::new("projects", Arc::new(MemoryStorage::new()), StorageBus::new()));
        (source.clone(), ProjectCache::new(store, source))
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_request() {
        let (source, cache) = setup();
        let (a, b) = tokio::join!(cache.refresh("dango", None, false), cache.refresh("dango", None, false));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.projects().len(), 1);
    }

    #[tokio::test]
    async fn test_forced_refresh_starts_new_request() {
        let (source, cache) = setup();
        let (_, forced) = tokio::join!(cache.refresh("dango", None, false), cache.refresh("dango", None, true));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(forced.unwrap()[0].name, "repo-2");
    }

    #[tokio::test]
    async fn test_staleness() {
        let (source, cache) = setup();
        assert!(cache.should_refresh());

        cache.ensure_fresh("dango", None).await.unwrap();
        assert!(!cache.should_refresh());
        cache.ensure_fresh("dango", None).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        cache.store().touch_checked_at(now_ms() - PROJECTS_MAX_AGE.as_millis() as i64 - 1_000);
        assert!(cache.should_refresh());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_list() {
        let (source, cache) = setup();
        cache.refresh("dango", None, false).await.unwrap();
        source.fail.store(true, Ordering::SeqCst);

        let err = cache.refresh("dango", None, true).await.unwrap_err();
        assert!(matches!(*err, ApiError::NotFound(_)));
        assert_eq!(cache.projects()[0].name, "repo-1");
    }

    #[tokio::test]
    async fn test_empty_username_skips_fetch() {
        let (source, cache) = setup();
        assert!(cache.refresh("  ", None, false).await.unwrap().is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_and_derived_lists() {
        let (_source, cache) = setup();
        cache.refresh("dango", None, false).await.unwrap();
        assert_eq!(cache.tags(), vec!["GitHub", "Rust"]);
        assert_eq!(cache.languages(), vec!["Rust"]);
        assert_eq!(cache.by_tag("Rust").len(), 1);
        assert_eq!(cache.by_language("Rust")[0].name, "repo-1");
        assert!(cache.by_language("Go").is_empty());

        cache.clear();
        assert!(cache.projects().is_empty());
        assert!(cache.should_refresh());
    }

    #[tokio::test]
    async fn test_clear_discards_in_flight_fetch() {
        let (source, cache) = setup();
        let clear_midway = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cache.clear();
        };
        let (fetched, _) = tokio::join!(cache.refresh("dango", None, false), clear_midway);

        assert_eq!(fetched.unwrap().len(), 1);
        assert!(cache.projects().is_empty());
        assert_eq!(cache.store().version(), "");
        assert!(cache.should_refresh());

        cache.refresh("dango", None, false).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.projects()[0].name, "repo-2");
    }

    #[tokio::test]
    async fn test_forced_refresh_wins_over_slower_joined_fetch() {
        let (_source, cache) = setup();
        cache.refresh("dango", None, true).await.unwrap();
        let (_, forced) = tokio::join!(cache.refresh("dango", None, false), cache.refresh("dango", None, true));
        assert_eq!(forced.unwrap()[0].name, "repo-3");
        assert_eq!(cache.projects()[0].name, "repo-3");
    }
}
