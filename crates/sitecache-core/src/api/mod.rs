//! REST API clients.
//!
//! This module provides:
//! - `SiteApi`: the operations the client needs from the site backend
//! - `ApiClient`: the reqwest implementation of `SiteApi`
//! - `GithubClient`: repository listing for the projects page
//!
//! The site backend wraps every payload in a `{ success, data, message }`
//! envelope; `ApiClient` unwraps it and maps failures onto `ApiError`.

pub mod client;
pub mod error;
pub mod github;
pub mod site;

pub use client::ApiClient;
pub use error::ApiError;
pub use github::GithubClient;
pub use site::SiteApi;
