//! Keeping cached resources in step with the server.
//!
//! - `reconcile`: the debounced version check and refetch for one resource
//! - `tasks`: the background queue reconciliation runs on
//! - `navigation`: routes and the rule for when a page view triggers a check

pub mod navigation;
pub mod reconcile;
pub mod tasks;

pub use navigation::{should_reconcile, Navigator, Route};
pub use reconcile::{
    ConfigResource, ProfileResource, Reconcile, ReconcileOutcome, Reconciler, Resource, TodosResource,
    DEFAULT_DEBOUNCE_WINDOW,
};
pub use tasks::BackgroundTasks;
