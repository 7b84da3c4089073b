//! The site context: everything a client session needs, built once.
//!
//! `SiteContext` owns the API client, durable storage, the storage bus, one
//! cache store per resource, their reconcilers, the navigator and the
//! background task queue. Consumers receive it explicitly; nothing here is
//! global.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context as _, Result};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::actions::{ConfigActions, ErrorNotice, ProfileActions, TodoActions};
use crate::api::{ApiClient, ApiError, GithubClient, SiteApi};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::models::{CachedProfile, Project, ResourceKind, SiteConfig, Todo};
use crate::projects::{ProjectCache, ProjectSource};
use crate::storage::{DurableStorage, FileStorage, StorageBus};
use crate::sync::{
    BackgroundTasks, ConfigResource, Navigator, ProfileResource, Reconcile, ReconcileOutcome, Reconciler,
    Route, TodosResource,
};

/// Durable storage lives in this subdirectory of the cache directory.
const STORE_DIR: &str = "store";

pub struct SiteContext {
    config: Config,
    api: Arc<dyn SiteApi>,
    profile: Arc<CacheStore<CachedProfile>>,
    todos: Arc<CacheStore<Vec<Todo>>>,
    site_config: Arc<CacheStore<SiteConfig>>,
    reconcilers: Vec<Arc<dyn Reconcile>>,
    todo_actions: TodoActions,
    profile_actions: ProfileActions,
    config_actions: ConfigActions,
    projects: Arc<ProjectCache>,
    navigator: Navigator,
    tasks: BackgroundTasks,
    notice: ErrorNotice,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SiteContext {
    /// Build the context from configuration, restore caches from disk and
    /// schedule the boot-time version check. Must be called within a tokio
    /// runtime.
    pub async fn start(config: Config) -> Result<Self> {
        let mut client = ApiClient::new(&config.api_url).context("Failed to build API client")?;
        if let Some(token) = config.api_token.as_deref() {
            client = client.with_token(token);
        }
        let github = GithubClient::new().context("Failed to build GitHub client")?;

        let store_dir = config.cache_dir()?.join(STORE_DIR);
        let storage = FileStorage::new(store_dir)?;
        info!(api = %config.api_url, storage = %storage.dir().display(), "Starting site context");

        let ctx = Self::with_parts(config, Arc::new(client), Arc::new(storage), StorageBus::new(), Arc::new(github));
        ctx.boot();
        Ok(ctx)
    }

    /// Assemble a context from explicit parts. Contexts built over the same
    /// storage and bus observe each other's writes. Must be called within a
    /// tokio runtime.
    pub fn with_parts(
        config: Config,
        api: Arc<dyn SiteApi>,
        storage: Arc<dyn DurableStorage>,
        bus: StorageBus,
        github: Arc<dyn ProjectSource>,
    ) -> Self {
        let window = config.debounce_window();
        let profile = Arc::new(CacheStore::new("profile", storage.clone(), bus.clone()));
        let todos = Arc::new(CacheStore::new("todos", storage.clone(), bus.clone()));
        let site_config = Arc::new(CacheStore::new("config", storage.clone(), bus.clone()));
        let project_store = Arc::new(CacheStore::<Vec<Project>>::new("projects", storage, bus));

        let config_reconciler = Arc::new(Reconciler::<ConfigResource>::new(site_config.clone(), api.clone(), window));
        let reconcilers: Vec<Arc<dyn Reconcile>> = vec![
            Arc::new(Reconciler::<ProfileResource>::new(profile.clone(), api.clone(), window)),
            Arc::new(Reconciler::<TodosResource>::new(todos.clone(), api.clone(), window)),
            config_reconciler.clone(),
        ];

        let notice = ErrorNotice::new();
        let (tasks, dispatcher) = BackgroundTasks::spawn();
        let handles = vec![
            dispatcher,
            profile.spawn_listener(),
            todos.spawn_listener(),
            site_config.spawn_listener(),
            project_store.spawn_listener(),
        ];

        Self {
            todo_actions: TodoActions::new(todos.clone(), api.clone(), notice.clone()),
            profile_actions: ProfileActions::new(profile.clone(), api.clone(), notice.clone()),
            config_actions: ConfigActions::new(config_reconciler, api.clone(), notice.clone()),
            projects: Arc::new(ProjectCache::new(project_store, github)),
            config,
            api,
            profile,
            todos,
            site_config,
            reconcilers,
            navigator: Navigator::new(),
            tasks,
            notice,
            handles: Mutex::new(handles),
        }
    }

    /// Restore every cache from durable storage, then check versions in the
    /// background so the restored data can be used immediately.
    pub fn boot(&self) {
        self.load_all();
        self.schedule_reconcile_all();
    }

    pub fn load_all(&self) {
        self.profile.load_from_durable();
        self.todos.load_from_durable();
        self.site_config.load_from_durable();
        self.projects.store().load_from_durable();
    }

    // ===== Reconciliation =====

    /// Queue a reconciliation pass for every resource and return immediately.
    pub fn schedule_reconcile_all(&self) {
        for reconciler in &self.reconcilers {
            let reconciler = reconciler.clone();
            self.tasks.submit("reconcile", async move {
                let outcome = reconciler.reconcile().await;
                debug!(resource = %reconciler.kind(), outcome = %outcome, "Background reconciliation finished");
            });
        }
    }

    /// Reconcile every resource concurrently and report the outcomes.
    pub async fn reconcile_all(&self) -> Vec<(ResourceKind, ReconcileOutcome)> {
        join_all(self.reconcilers.iter().map(|r| async move { (r.kind(), r.reconcile().await) })).await
    }

    /// Refetch every resource regardless of debounce or version.
    pub async fn force_refresh_all(&self) -> Vec<(ResourceKind, ReconcileOutcome)> {
        join_all(self.reconcilers.iter().map(|r| async move { (r.kind(), r.force_refresh().await) })).await
    }

    /// Record a page view; schedules reconciliation unless the transition is
    /// the first one or leads to the login page. Returns whether it did.
    pub fn navigate(&self, to: Route) -> bool {
        let scheduled = self.navigator.navigate(to);
        if scheduled {
            self.schedule_reconcile_all();
        }
        scheduled
    }

    // ===== Projects =====

    /// GitHub account for the projects page: configured override first,
    /// then the one on the profile card.
    pub fn github_username(&self) -> Option<String> {
        self.config.github_username.clone().or_else(|| {
            self.profile
                .with_data(|cached| Some(cached.profile.github_username.clone()).filter(|u| !u.is_empty()))
        })
    }

    /// Refresh the project list if stale (or always, with `force`), using the
    /// cached site config's GitHub token.
    pub async fn refresh_projects(&self, force: bool) -> Result<Vec<Project>, Arc<ApiError>> {
        let Some(username) = self.github_username() else {
            debug!("No GitHub username configured, skipping project refresh");
            return Ok(self.projects.projects());
        };
        let token = self.site_config.with_data(|c| c.github_token.clone()).filter(|t| !t.is_empty());
        if force {
            self.projects.refresh(&username, token.as_deref(), true).await
        } else {
            self.projects.ensure_fresh(&username, token.as_deref()).await
        }
    }

    // ===== Accessors =====

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &Arc<dyn SiteApi> {
        &self.api
    }

    pub fn profile(&self) -> &Arc<CacheStore<CachedProfile>> {
        &self.profile
    }

    pub fn todos(&self) -> &Arc<CacheStore<Vec<Todo>>> {
        &self.todos
    }

    pub fn site_config(&self) -> &Arc<CacheStore<SiteConfig>> {
        &self.site_config
    }

    pub fn todo_actions(&self) -> &TodoActions {
        &self.todo_actions
    }

    pub fn profile_actions(&self) -> &ProfileActions {
        &self.profile_actions
    }

    pub fn config_actions(&self) -> &ConfigActions {
        &self.config_actions
    }

    pub fn projects(&self) -> &Arc<ProjectCache> {
        &self.projects
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn notice(&self) -> &ErrorNotice {
        &self.notice
    }

    /// Wait for queued background work, then stop the dispatcher and the
    /// storage listeners.
    pub async fn shutdown(&self) {
        self.tasks.wait_idle().await;
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            handle.abort();
        }
        debug!("Site context shut down");
    }
}

// ============================================================================
// Tests
// ============================================================================
