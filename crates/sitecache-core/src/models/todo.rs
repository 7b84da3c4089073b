//! Todo list items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Categories always offered, even before any todo uses them.
pub const DEFAULT_CATEGORIES: [&str; 5] = ["work", "study", "life", "leisure", "other"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// A todo item.
///
/// Items fetched from the server carry `_id`. Items created while the server
/// was unreachable only have a local numeric `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Todo {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Todo {
    /// Match either the server id or the local numeric id.
    pub fn matches(&self, key: &str) -> bool {
        self.server_id.as_deref() == Some(key)
            || self.id.map(|id| id.to_string()).as_deref() == Some(key)
    }

    /// Identifier for display: server id when present, local id otherwise.
    pub fn display_id(&self) -> String {
        match (&self.server_id, self.id) {
            (Some(sid), _) => sid.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => "?".to_string(),
        }
    }
}

/// Most recent `updatedAt` across the list.
pub fn latest_update(todos: &[Todo]) -> Option<DateTime<Utc>> {
    todos.iter().filter_map(|t| t.updated_at).max()
}

/// Default categories followed by any extra ones in use, in first-seen order.
pub fn categories(todos: &[Todo]) -> Vec<String> {
    let mut out: Vec<String> = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
    for todo in todos {
        if !todo.category.is_empty() && !out.contains(&todo.category) {
            out.push(todo.category.clone());
        }
    }
    out
}

/// Next local id for an item created offline.
pub fn next_local_id(todos: &[Todo]) -> i64 {
    todos.iter().filter_map(|t| t.id).max().unwrap_or(0) + 1
}

/// Body of `POST /api/todos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewTodo {
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    pub category: String,
}

impl NewTodo {
    pub fn new(text: impl Into<String>, priority: Priority, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
            priority,
            category: category.into(),
        }
    }

    /// Local stand-in used when the server could not create the item.
    pub fn into_local(self, id: i64) -> Todo {
        Todo {
            server_id: None,
            id: Some(id),
            text: self.text,
            completed: false,
            priority: self.priority,
            category: self.category,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Partial update for `PUT /api/todos/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TodoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none() && self.priority.is_none() && self.category.is_none()
    }

    pub fn apply(&self, todo: &mut Todo) {
        if let Some(ref text) = self.text {
            todo.text = text.clone();
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
        if let Some(ref category) = self.category {
            todo.category = category.clone();
        }
    }
}
