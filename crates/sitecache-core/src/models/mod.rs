//! Data models for site resources.
//!
//! This module contains the payloads the site API serves and the client
//! caches locally:
//!
//! - `ProfileDocument`, `CachedProfile`: profile card plus career timeline
//! - `Todo`, `NewTodo`, `TodoPatch`: todo list items and their mutations
//! - `SiteConfig`: site-level settings (GitHub token, preferences)
//! - `Project`, `GithubRepo`: GitHub repositories shown on the projects page
//! - `VersionSnapshot`, `ResourceKind`: the version oracle's answer

pub mod profile;
pub mod project;
pub mod site_config;
pub mod todo;
pub mod version;

pub use profile::{CachedProfile, Profile, ProfileDocument, ProfileStatus, TimelineEntry};
pub use project::{GithubRepo, Project};
pub use site_config::SiteConfig;
pub use todo::{NewTodo, Priority, Todo, TodoPatch, DEFAULT_CATEGORIES};
pub use version::{stamp, ResourceKind, VersionSnapshot};

use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` the same as a missing field.
/// Documents written by the site's database layer often carry `null` for unset values.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
