//! User-initiated writes.
//!
//! These bypass reconciliation: the server is written directly and the cache
//! is updated in place, stamped as a local edit. Todos and `update_profile`
//! are optimistic and roll back on failure; the remaining profile and config
//! writes wait for the server before touching the cache.

pub mod config;
pub mod notice;
pub mod profile;
pub mod todos;

pub use config::ConfigActions;
pub use notice::{ErrorNotice, TRANSIENT_ERROR_TTL};
pub use profile::ProfileActions;
pub use todos::TodoActions;

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("No todo with id {0}")]
    NotFound(String),

    #[error("Todo {0} only exists locally and has no server id")]
    MissingServerId(String),

    #[error("Server unavailable, saved locally as #{id}: {source}")]
    SavedLocally {
        id: i64,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}
