use std::sync::Arc;

use tracing::{info, warn};

use crate::api::SiteApi;
use crate::sync::{ConfigResource, ReconcileOutcome, Reconciler};

use super::{ActionError, ErrorNotice};

/// Site configuration writes. Each successful write is followed by a full
/// refetch so the cache reflects the server's canonical record.
#[derive(Clone)]
pub struct ConfigActions {
    reconciler: Arc<Reconciler<ConfigResource>>,
    api: Arc<dyn SiteApi>,
    notice: ErrorNotice,
}

impl ConfigActions {
    pub fn new(reconciler: Arc<Reconciler<ConfigResource>>, api: Arc<dyn SiteApi>, notice: ErrorNotice) -> Self {
        Self { reconciler, api, notice }
    }

    pub async fn update_github_token(&self, token: &str) -> Result<ReconcileOutcome, ActionError> {
        self.notice.clear();
        if let Err(e) = self.api.update_github_token(token).await {
            warn!(error = %e, "Failed to update GitHub token");
            self.notice.raise("Failed to update GitHub token");
            return Err(e.into());
        }
        info!("GitHub token updated");
        Ok(self.reconciler.run_forced().await)
    }

    pub async fn delete_github_token(&self) -> Result<ReconcileOutcome, ActionError> {
        self.notice.clear();
        if let Err(e) = self.api.delete_github_token().await {
            warn!(error = %e, "Failed to delete GitHub token");
            self.notice.raise("Failed to delete GitHub token");
            return Err(e.into());
        }
        info!("GitHub token deleted");
        Ok(self.reconciler.run_forced().await)
    }
}
