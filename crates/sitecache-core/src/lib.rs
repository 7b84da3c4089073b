//! sitecache-core - client-side caching for a personal site's REST API.
//!
//! Profile, todo list and site configuration are kept in durable local
//! storage and served from there immediately. A cheap version check against
//! the server's `/api/version` endpoint decides, at most once per debounce
//! window, whether a resource needs to be refetched.
//!
//! Start with [`SiteContext::start`], which wires together:
//! - [`api`]: the site and GitHub HTTP clients
//! - [`storage`] and [`cache`]: durable key/value storage and per-resource stores
//! - [`sync`]: reconciliation, background tasks and the navigation trigger
//! - [`actions`]: user-initiated writes with optimistic updates
//! - [`projects`]: the GitHub repository list

pub mod actions;
pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod models;
pub mod projects;
pub mod storage;
pub mod sync;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use context::SiteContext;
