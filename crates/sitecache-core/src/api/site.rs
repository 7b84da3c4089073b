use futures::future::BoxFuture;

use crate::models::{NewTodo, Profile, ProfileDocument, SiteConfig, TimelineEntry, Todo, TodoPatch, VersionSnapshot};

use super::ApiError;

/// Operations the client needs from the site backend.
///
/// Object safe so the context can hold an `Arc<dyn SiteApi>` and tests can
/// swap in a scripted implementation.
pub trait SiteApi: Send + Sync {
    /// `GET /version` - current modification stamps of all resources.
    fn fetch_versions(&self) -> BoxFuture<'_, Result<VersionSnapshot, ApiError>>;

    fn fetch_profile(&self) -> BoxFuture<'_, Result<ProfileDocument, ApiError>>;
    fn fetch_todos(&self) -> BoxFuture<'_, Result<Vec<Todo>, ApiError>>;
    fn fetch_config(&self) -> BoxFuture<'_, Result<SiteConfig, ApiError>>;

    // ===== Todo mutations =====

    fn create_todo<'a>(&'a self, todo: &'a NewTodo) -> BoxFuture<'a, Result<Todo, ApiError>>;
    fn update_todo<'a>(&'a self, id: &'a str, patch: &'a TodoPatch) -> BoxFuture<'a, Result<(), ApiError>>;
    fn toggle_todo<'a>(&'a self, id: &'a str, completed: bool) -> BoxFuture<'a, Result<(), ApiError>>;
    fn delete_todo<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ApiError>>;
    /// Returns the number of deleted items.
    fn delete_completed_todos(&self) -> BoxFuture<'_, Result<u64, ApiError>>;

    // ===== Profile mutations =====

    fn update_profile<'a>(&'a self, profile: &'a Profile) -> BoxFuture<'a, Result<ProfileDocument, ApiError>>;
    fn update_timeline<'a>(
        &'a self,
        timeline: &'a [TimelineEntry],
    ) -> BoxFuture<'a, Result<ProfileDocument, ApiError>>;
    fn update_skills<'a>(&'a self, skills: &'a [String]) -> BoxFuture<'a, Result<ProfileDocument, ApiError>>;
    fn reset_profile(&self) -> BoxFuture<'_, Result<ProfileDocument, ApiError>>;

    // ===== Config mutations =====

    fn update_github_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<(), ApiError>>;
    fn delete_github_token(&self) -> BoxFuture<'_, Result<(), ApiError>>;
}
