//! The version oracle: current modification stamps of each site resource.
//!
//! Stamps are computed from the document source on every request; nothing is
//! cached server-side.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use futures::future::{try_join3, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use sitecache_core::models::todo::latest_update;
use sitecache_core::models::{ProfileDocument, SiteConfig, Todo, VersionSnapshot};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the site's documents live. A missing record is not an error.
pub trait DocumentSource: Send + Sync {
    fn profile(&self) -> BoxFuture<'_, Result<Option<ProfileDocument>, SourceError>>;
    fn todos(&self) -> BoxFuture<'_, Result<Vec<Todo>, SourceError>>;
    fn config(&self) -> BoxFuture<'_, Result<Option<SiteConfig>, SourceError>>;
}

/// Compute the current snapshot from a source.
pub async fn version_snapshot(source: &dyn DocumentSource) -> Result<VersionSnapshot, SourceError> {
    let (profile, todos, config) = try_join3(source.profile(), source.todos(), source.config()).await?;
    let snapshot = VersionSnapshot::from_timestamps(
        profile.and_then(|p| p.updated_at),
        latest_update(&todos),
        config.and_then(|c| c.updated_at),
    );
    debug!(profile = %snapshot.profile, todos = %snapshot.todos, config = %snapshot.config, "Computed versions");
    Ok(snapshot)
}

// ===== JSON directory =====

const PROFILE_FILE: &str = "profile.json";
const TODOS_FILE: &str = "todos.json";
const CONFIG_FILE: &str = "config.json";

/// Documents stored as JSON files in one directory, re-read on every request.
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, SourceError> {
        let path = self.dir.join(file);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SourceError::Io { path, source }),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| SourceError::Parse { path, source })
    }
}

impl DocumentSource for JsonDirSource {
    fn profile(&self) -> BoxFuture<'_, Result<Option<ProfileDocument>, SourceError>> {
        self.read(PROFILE_FILE).boxed()
    }

    fn todos(&self) -> BoxFuture<'_, Result<Vec<Todo>, SourceError>> {
        async move { Ok(self.read(TODOS_FILE).await?.unwrap_or_default()) }.boxed()
    }

    fn config(&self) -> BoxFuture<'_, Result<Option<SiteConfig>, SourceError>> {
        self.read(CONFIG_FILE).boxed()
    }
}

// ===== In memory =====

/// Documents held in process. Used when no data directory is configured.
#[derive(Default)]
pub struct MemorySource {
    profile: RwLock<Option<ProfileDocument>>,
    todos: RwLock<Vec<Todo>>,
    config: RwLock<Option<SiteConfig>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_profile(&self, profile: Option<ProfileDocument>) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = profile;
    }

    pub fn set_todos(&self, todos: Vec<Todo>) {
        *self.todos.write().unwrap_or_else(PoisonError::into_inner) = todos;
    }

    pub fn set_config(&self, config: Option<SiteConfig>) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

impl DocumentSource for MemorySource {
    fn profile(&self) -> BoxFuture<'_, Result<Option<ProfileDocument>, SourceError>> {
        let profile = self.profile.read().unwrap_or_else(PoisonError::into_inner).clone();
        async move { Ok(profile) }.boxed()
    }

    fn todos(&self) -> BoxFuture<'_, Result<Vec<Todo>, SourceError>> {
        let todos = self.todos.read().unwrap_or_else(PoisonError::into_inner).clone();
        async move { Ok(todos) }.boxed()
    }

    fn config(&self) -> BoxFuture<'_, Result<Option<SiteConfig>, SourceError>> {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner).clone();
        async move { Ok(config) }.boxed()
    }
}

// ============================================================================
// Tests
// ============================================================================
