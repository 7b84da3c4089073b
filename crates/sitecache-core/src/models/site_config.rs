use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::null_as_default;

/// Site-level settings served by `GET /api/config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SiteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown>"))]
    pub preferences: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SiteConfig {
    /// The configured GitHub token, or an empty string.
    pub fn github_token(&self) -> &str {
        self.github_token.as_deref().unwrap_or("")
    }

    pub fn preferences(&self) -> &Map<String, Value> {
        &self.preferences
    }

    pub fn has_github_token(&self) -> bool {
        !self.github_token().is_empty()
    }
}
