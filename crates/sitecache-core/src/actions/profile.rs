use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{ApiError, SiteApi};
use crate::cache::CacheStore;
use crate::models::{CachedProfile, Profile, ProfileDocument, TimelineEntry};

use super::{ActionError, ErrorNotice};

#[derive(Clone)]
pub struct ProfileActions {
    store: Arc<CacheStore<CachedProfile>>,
    api: Arc<dyn SiteApi>,
    notice: ErrorNotice,
}

impl ProfileActions {
    pub fn new(store: Arc<CacheStore<CachedProfile>>, api: Arc<dyn SiteApi>, notice: ErrorNotice) -> Self {
        Self { store, api, notice }
    }

    pub fn notice(&self) -> &ErrorNotice {
        &self.notice
    }

    /// Optimistically replace the profile card, restoring it on failure.
    pub async fn update_profile(&self, profile: Profile) -> Result<(), ActionError> {
        self.notice.clear();
        let original = self.store.update_data(|cached| std::mem::replace(&mut cached.profile, profile.clone()));

        match self.api.update_profile(&profile).await {
            Ok(doc) => {
                self.store.mutate_local(|cached| cached.profile = doc.profile);
                debug!("Profile updated");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Profile update failed, rolling back");
                self.store.mutate_local(|cached| cached.profile = original);
                self.notice.raise("Failed to update profile");
                Err(e.into())
            }
        }
    }

    pub async fn update_timeline(&self, timeline: Vec<TimelineEntry>) -> Result<(), ActionError> {
        let result = self.api.update_timeline(&timeline).await;
        self.apply(result, "Failed to update timeline", |cached, doc| cached.timeline = doc.timeline)
    }

    pub async fn update_skills(&self, skills: Vec<String>) -> Result<(), ActionError> {
        let result = self.api.update_skills(&skills).await;
        self.apply(result, "Failed to update skills", |cached, doc| {
            cached.profile.skills = doc.profile.skills
        })
    }

    /// Restore the server-side defaults and adopt them locally.
    pub async fn reset_profile(&self) -> Result<(), ActionError> {
        let result = self.api.reset_profile().await;
        self.apply(result, "Failed to reset profile", |cached, doc| {
            *cached = CachedProfile::from(doc)
        })
    }

    /// Apply a server-first write's response to the cache.
    fn apply(
        &self,
        result: Result<ProfileDocument, ApiError>,
        failure: &str,
        merge: impl FnOnce(&mut CachedProfile, ProfileDocument),
    ) -> Result<(), ActionError> {
        self.notice.clear();
        match result {
            Ok(doc) => {
                self.store.mutate_local(|cached| merge(cached, doc));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "{}", failure);
                self.notice.raise(failure);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageBus};
    use crate::testing::FakeApi;

    fn setup() -> (Arc<FakeApi>, Arc<CacheStore<CachedProfile>>, ProfileActions) {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(CacheStore::new("profile", Arc::new(MemoryStorage::new()), StorageBus::new()));
        let cached = CachedProfile {
            profile: Profile {
                name: "Before".to_string(),
                skills: vec!["Rust".to_string()],
                ..Default::default()
            },
            timeline: vec![],
        };
        store.replace(cached, "100".to_string());
        let actions = ProfileActions::new(store.clone(), api.clone(), ErrorNotice::new());
        (api, store, actions)
    }

    fn named(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_update_profile_success() {
        let (_api, store, actions) = setup();
        actions.update_profile(named("After")).await.unwrap();
        assert_eq!(store.data().profile.name, "After");
        assert_ne!(store.version(), "100");
    }

    #[tokio::test]
    async fn test_update_profile_rolls_back() {
        let (api, store, actions) = setup();
        api.fail_writes(true);
        assert!(actions.update_profile(named("After")).await.is_err());
        assert_eq!(store.data().profile.name, "Before");
        assert_eq!(actions.notice().current().as_deref(), Some("Failed to update profile"));
    }

    #[tokio::test]
    async fn test_update_skills_only_touches_skills() {
        let (_api, store, actions) = setup();
        actions
            .update_skills(vec!["Rust".to_string(), "Vue".to_string()])
            .await
            .unwrap();
        let cached = store.data();
        assert_eq!(cached.profile.skills, vec!["Rust", "Vue"]);
        assert_eq!(cached.profile.name, "Before");
    }

    #[tokio::test]
    async fn test_update_timeline() {
        let (_api, store, actions) = setup();
        let entry = TimelineEntry {
            year: "2024".to_string(),
            title: "Engineer".to_string(),
            ..Default::default()
        };
        actions.update_timeline(vec![entry.clone()]).await.unwrap();
        assert_eq!(store.data().timeline, vec![entry]);
    }

    #[tokio::test]
    async fn test_server_first_failure_leaves_cache() {
        let (api, store, actions) = setup();
        api.fail_writes(true);
        assert!(actions.reset_profile().await.is_err());
        assert_eq!(store.data().profile.name, "Before");
        assert_eq!(store.version(), "100");
    }
}
