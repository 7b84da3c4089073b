//! Profile card and career timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Short "what I'm doing" line shown under the avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProfileStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub emoji: String,
}

impl Default for ProfileStatus {
    fn default() -> Self {
        Self {
            text: "Coding...".to_string(),
            emoji: "💻".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Profile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avatar: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bio: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub github: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub qq: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wechat: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub website: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub position: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ProfileStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub github_username: String,
}

/// One row of the resume timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TimelineEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub year: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// The profile record as served by `GET /api/profile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProfileDocument {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timeline: Vec<TimelineEntry>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Locally cached form: profile and timeline travel together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CachedProfile {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

impl From<ProfileDocument> for CachedProfile {
    fn from(doc: ProfileDocument) -> Self {
        Self {
            profile: doc.profile,
            timeline: doc.timeline,
        }
    }
}
