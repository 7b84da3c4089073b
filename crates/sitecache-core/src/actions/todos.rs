use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::SiteApi;
use crate::cache::CacheStore;
use crate::models::todo::next_local_id;
use crate::models::{NewTodo, Todo, TodoPatch};

use super::{ActionError, ErrorNotice, TRANSIENT_ERROR_TTL};

const ADD_FAILED: &str = "Failed to add todo";
const TOGGLE_FAILED: &str = "Failed to update todo status";
const UPDATE_FAILED: &str = "Failed to update todo";
const REMOVE_FAILED: &str = "Failed to delete todo";
const DELETE_COMPLETED_FAILED: &str = "Failed to delete completed todos";

/// Todo list mutations. Items are addressed by server `_id` or local `id`.
#[derive(Clone)]
pub struct TodoActions {
    store: Arc<CacheStore<Vec<Todo>>>,
    api: Arc<dyn SiteApi>,
    notice: ErrorNotice,
}

impl TodoActions {
    pub fn new(store: Arc<CacheStore<Vec<Todo>>>, api: Arc<dyn SiteApi>, notice: ErrorNotice) -> Self {
        Self { store, api, notice }
    }

    pub fn notice(&self) -> &ErrorNotice {
        &self.notice
    }

    fn find(&self, key: &str) -> Option<(usize, Todo)> {
        self.store
            .with_data(|todos| todos.iter().position(|t| t.matches(key)).map(|i| (i, todos[i].clone())))
    }

    /// Create on the server and insert at the front. If the server is
    /// unreachable the item is kept locally with the next free local id.
    pub async fn add(&self, new: NewTodo) -> Result<Todo, ActionError> {
        self.notice.clear();
        match self.api.create_todo(&new).await {
            Ok(todo) => {
                self.store.mutate_local(|todos| todos.insert(0, todo.clone()));
                debug!(id = %todo.display_id(), "Todo created");
                Ok(todo)
            }
            Err(e) => {
                warn!(error = %e, "Create failed, keeping todo locally");
                let id = self.store.mutate_local(|todos| {
                    let id = next_local_id(todos);
                    todos.insert(0, new.into_local(id));
                    id
                });
                self.notice.raise(ADD_FAILED);
                Err(ActionError::SavedLocally { id, source: e })
            }
        }
    }

    /// Flip `completed`, rolling back if the server rejects it.
    pub async fn toggle(&self, key: &str) -> Result<bool, ActionError> {
        let (_, original) = self.find(key).ok_or_else(|| ActionError::NotFound(key.to_string()))?;
        let completed = !original.completed;
        self.set_completed(key, completed);

        let result = match original.server_id.as_deref() {
            Some(id) => self.api.toggle_todo(id, completed).await.map_err(ActionError::from),
            None => Err(ActionError::MissingServerId(key.to_string())),
        };

        match result {
            Ok(()) => {
                self.store.commit_local();
                Ok(completed)
            }
            Err(e) => {
                warn!(todo = key, error = %e, "Toggle failed, rolling back");
                self.set_completed(key, original.completed);
                self.store.commit_local();
                self.notice.flash(TOGGLE_FAILED, TRANSIENT_ERROR_TTL);
                Err(e)
            }
        }
    }

    fn set_completed(&self, key: &str, completed: bool) {
        self.store.update_data(|todos| {
            if let Some(todo) = todos.iter_mut().find(|t| t.matches(key)) {
                todo.completed = completed;
            }
        });
    }

    /// Apply a partial update, restoring the original item on failure.
    pub async fn update(&self, key: &str, patch: &TodoPatch) -> Result<(), ActionError> {
        let (_, original) = self.find(key).ok_or_else(|| ActionError::NotFound(key.to_string()))?;
        self.store.update_data(|todos| {
            if let Some(todo) = todos.iter_mut().find(|t| t.matches(key)) {
                patch.apply(todo);
            }
        });

        let result = match original.server_id.as_deref() {
            Some(id) => self.api.update_todo(id, patch).await.map_err(ActionError::from),
            None => Err(ActionError::MissingServerId(key.to_string())),
        };

        if let Err(e) = result {
            warn!(todo = key, error = %e, "Update failed, rolling back");
            self.store.update_data(|todos| {
                if let Some(todo) = todos.iter_mut().find(|t| t.matches(key)) {
                    *todo = original;
                }
            });
            self.store.commit_local();
            self.notice.flash(UPDATE_FAILED, TRANSIENT_ERROR_TTL);
            return Err(e);
        }

        self.store.commit_local();
        Ok(())
    }

    /// Remove an item, reinserting it at its old position on failure.
    pub async fn remove(&self, key: &str) -> Result<(), ActionError> {
        let (index, original) = self.find(key).ok_or_else(|| ActionError::NotFound(key.to_string()))?;
        self.store.update_data(|todos| todos.retain(|t| !t.matches(key)));

        let result = match original.server_id.as_deref() {
            Some(id) => self.api.delete_todo(id).await.map_err(ActionError::from),
            None => Err(ActionError::MissingServerId(key.to_string())),
        };

        if let Err(e) = result {
            warn!(todo = key, error = %e, "Delete failed, restoring item");
            self.store.update_data(|todos| {
                let at = index.min(todos.len());
                todos.insert(at, original);
            });
            self.store.commit_local();
            self.notice.flash(REMOVE_FAILED, TRANSIENT_ERROR_TTL);
            return Err(e);
        }

        self.store.commit_local();
        Ok(())
    }

    /// Delete every completed item server-side, then drop them locally.
    pub async fn delete_completed(&self) -> Result<u64, ActionError> {
        self.notice.clear();
        match self.api.delete_completed_todos().await {
            Ok(deleted) => {
                self.store.mutate_local(|todos| todos.retain(|t| !t.completed));
                debug!(deleted, "Completed todos deleted");
                Ok(deleted)
            }
            Err(e) => {
                warn!(error = %e, "Bulk delete failed");
                self.notice.raise(format!("{}: {}", DELETE_COMPLETED_FAILED, e));
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
