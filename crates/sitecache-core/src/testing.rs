//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use futures::future::{BoxFuture, FutureExt};

use crate::api::{ApiError, SiteApi};
use crate::models::{
    NewTodo, Profile, ProfileDocument, SiteConfig, TimelineEntry, Todo, TodoPatch, VersionSnapshot,
};
use crate::storage::DurableStorage;

/// Storage where every operation fails, like a browser with storage disabled.
#[derive(Default)]
pub struct FailingStorage;

impl DurableStorage for FailingStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        bail!("storage unavailable reading {}", key)
    }

    fn set(&self, key: &str, _value: &str) -> Result<()> {
        bail!("storage quota exceeded writing {}", key)
    }

    fn remove(&self, key: &str) -> Result<()> {
        bail!("storage unavailable removing {}", key)
    }
}

fn scripted_failure() -> ApiError {
    ApiError::Server {
        status: 500,
        message: "scripted failure".to_string(),
    }
}

/// Scripted in-process backend. `None` in a response slot means the call fails.
#[derive(Default)]
pub struct FakeApi {
    pub versions: Mutex<Option<VersionSnapshot>>,
    pub profile: Mutex<Option<ProfileDocument>>,
    pub todos: Mutex<Option<Vec<Todo>>>,
    pub config: Mutex<Option<SiteConfig>>,
    pub fail_writes: AtomicBool,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_versions(&self, profile: &str, todos: &str, config: &str) {
        *self.versions.lock().unwrap() = Some(VersionSnapshot {
            profile: profile.to_string(),
            todos: todos.to_string(),
            config: config.to_string(),
        });
    }

    pub fn set_todos(&self, todos: Option<Vec<Todo>>) {
        *self.todos.lock().unwrap() = todos;
    }

    pub fn set_profile(&self, profile: Option<ProfileDocument>) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn set_config(&self, config: Option<SiteConfig>) {
        *self.config.lock().unwrap() = config;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of recorded calls with the given name.
    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn read<T: Clone>(&self, name: &str, slot: &Mutex<Option<T>>) -> Result<T, ApiError> {
        self.record(name);
        slot.lock().unwrap().clone().ok_or_else(scripted_failure)
    }

    fn write(&self, name: &str) -> Result<(), ApiError> {
        self.record(name);
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(scripted_failure())
        } else {
            Ok(())
        }
    }

    fn document(&self) -> ProfileDocument {
        self.profile.lock().unwrap().clone().unwrap_or_default()
    }
}

impl SiteApi for FakeApi {
    fn fetch_versions(&self) -> BoxFuture<'_, Result<VersionSnapshot, ApiError>> {
        let result = self.read("fetch_versions", &self.versions);
        async move { result }.boxed()
    }

    fn fetch_profile(&self) -> BoxFuture<'_, Result<ProfileDocument, ApiError>> {
        let result = self.read("fetch_profile", &self.profile);
        async move { result }.boxed()
    }

    fn fetch_todos(&self) -> BoxFuture<'_, Result<Vec<Todo>, ApiError>> {
        let result = self.read("fetch_todos", &self.todos);
        async move { result }.boxed()
    }

    fn fetch_config(&self) -> BoxFuture<'_, Result<SiteConfig, ApiError>> {
        let result = self.read("fetch_config", &self.config);
        async move { result }.boxed()
    }

    fn create_todo<'a>(&'a self, todo: &'a NewTodo) -> BoxFuture<'a, Result<Todo, ApiError>> {
        let result = self.write("create_todo").map(|()| Todo {
            server_id: Some(format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)),
            id: None,
            text: todo.text.clone(),
            completed: todo.completed,
            priority: todo.priority,
            category: todo.category.clone(),
            created_at: None,
            updated_at: None,
        });
        async move { result }.boxed()
    }

    fn update_todo<'a>(&'a self, _id: &'a str, _patch: &'a TodoPatch) -> BoxFuture<'a, Result<(), ApiError>> {
        let result = self.write("update_todo");
        async move { result }.boxed()
    }

    fn toggle_todo<'a>(&'a self, _id: &'a str, _completed: bool) -> BoxFuture<'a, Result<(), ApiError>> {
        let result = self.write("toggle_todo");
        async move { result }.boxed()
    }

    fn delete_todo<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        let result = self.write("delete_todo");
        async move { result }.boxed()
    }

    fn delete_completed_todos(&self) -> BoxFuture<'_, Result<u64, ApiError>> {
        let result = self.write("delete_completed_todos").map(|()| 0);
        async move { result }.boxed()
    }

    fn update_profile<'a>(&'a self, profile: &'a Profile) -> BoxFuture<'a, Result<ProfileDocument, ApiError>> {
        let result = self.write("update_profile").map(|()| ProfileDocument {
            profile: profile.clone(),
            ..self.document()
        });
        async move { result }.boxed()
    }

    fn update_timeline<'a>(
        &'a self,
        timeline: &'a [TimelineEntry],
    ) -> BoxFuture<'a, Result<ProfileDocument, ApiError>> {
        let result = self.write("update_timeline").map(|()| ProfileDocument {
            timeline: timeline.to_vec(),
            ..self.document()
        });
        async move { result }.boxed()
    }

    fn update_skills<'a>(&'a self, skills: &'a [String]) -> BoxFuture<'a, Result<ProfileDocument, ApiError>> {
        let result = self.write("update_skills").map(|()| {
            let mut doc = self.document();
            doc.profile.skills = skills.to_vec();
            doc
        });
        async move { result }.boxed()
    }

    fn reset_profile(&self) -> BoxFuture<'_, Result<ProfileDocument, ApiError>> {
        let result = self.write("reset_profile").map(|()| self.document());
        async move { result }.boxed()
    }

    fn update_github_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        let result = self.write("update_github_token");
        if result.is_ok() {
            let mut config = self.config.lock().unwrap();
            let current = config.get_or_insert_with(SiteConfig::default);
            current.github_token = Some(token.to_string());
        }
        async move { result }.boxed()
    }

    fn delete_github_token(&self) -> BoxFuture<'_, Result<(), ApiError>> {
        let result = self.write("delete_github_token");
        if result.is_ok() {
            if let Some(config) = self.config.lock().unwrap().as_mut() {
                config.github_token = None;
            }
        }
        async move { result }.boxed()
    }
}
