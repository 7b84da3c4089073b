//! Local caching of site resources.
//!
//! Each resource (profile, todos, config, projects) has one `CacheStore`
//! holding a `CachedResource`: the last known data, the version stamp that
//! data corresponds to, and when the server was last asked about it. All
//! three are mirrored into durable storage under
//! `<resource>_data`, `<resource>_version` and `<resource>_last_version_check`.

pub mod resource;
pub mod store;

pub use resource::CachedResource;
pub use store::CacheStore;
