use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the independently cached site resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ResourceKind {
    Profile,
    Todos,
    Config,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Profile, ResourceKind::Todos, ResourceKind::Config];

    /// Name used for API paths and durable storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Profile => "profile",
            ResourceKind::Todos => "todos",
            ResourceKind::Config => "config",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "profile" => Ok(ResourceKind::Profile),
            "todos" | "todo" => Ok(ResourceKind::Todos),
            "config" => Ok(ResourceKind::Config),
            other => Err(format!("unknown resource: {}", other)),
        }
    }
}

/// Current modification stamps of every tracked resource, as reported by
/// `GET /api/version`. Each value is epoch milliseconds as a decimal string,
/// `"0"` when the resource has no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct VersionSnapshot {
    #[serde(default = "zero")]
    pub profile: String,
    #[serde(default = "zero")]
    pub todos: String,
    #[serde(default = "zero")]
    pub config: String,
}

fn zero() -> String {
    "0".to_string()
}

impl Default for VersionSnapshot {
    fn default() -> Self {
        Self {
            profile: zero(),
            todos: zero(),
            config: zero(),
        }
    }
}

impl VersionSnapshot {
    pub fn from_timestamps(
        profile: Option<DateTime<Utc>>,
        todos: Option<DateTime<Utc>>,
        config: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            profile: stamp(profile),
            todos: stamp(todos),
            config: stamp(config),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::Profile => &self.profile,
            ResourceKind::Todos => &self.todos,
            ResourceKind::Config => &self.config,
        }
    }
}

/// Encode a modification time as a version stamp (`"0"` when absent).
pub fn stamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.timestamp_millis()).unwrap_or(0).to_string()
}
