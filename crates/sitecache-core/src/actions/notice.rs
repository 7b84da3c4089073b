use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

/// How long a transient mutation error stays visible.
pub const TRANSIENT_ERROR_TTL: Duration = Duration::from_secs(3);

#[derive(Default)]
struct Inner {
    current: Mutex<Option<(u64, String)>>,
    next_id: AtomicU64,
}

/// The user-visible error slot shared by a set of actions.
///
/// `flash` schedules its own removal; a newer message replaces the old one
/// and is not cleared by the older timer.
#[derive(Clone, Default)]
pub struct ErrorNotice {
    inner: Arc<Inner>,
}

impl ErrorNotice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.lock().as_ref().map(|(_, msg)| msg.clone())
    }

    /// Show a message until it is cleared or replaced.
    pub fn raise(&self, message: impl Into<String>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        *self.lock() = Some((id, message.into()));
        id
    }

    /// Show a message that clears itself after `ttl`. Must be called within a
    /// tokio runtime.
    pub fn flash(&self, message: impl Into<String>, ttl: Duration) {
        let id = self.raise(message);
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = inner.upgrade() {
                let mut current = inner.current.lock().unwrap_or_else(PoisonError::into_inner);
                if matches!(current.as_ref(), Some((shown, _)) if *shown == id) {
                    *current = None;
                    debug!("Transient error cleared");
                }
            }
        });
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(u64, String)>> {
        self.inner.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_flash_clears_after_ttl() {
        let notice = ErrorNotice::new();
        notice.flash("Failed to update todo", TRANSIENT_ERROR_TTL);
        assert_eq!(notice.current().as_deref(), Some("Failed to update todo"));

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert!(notice.current().is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(notice.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_message_survives_older_timer() {
        let notice = ErrorNotice::new();
        notice.flash("first", TRANSIENT_ERROR_TTL);
        tokio::time::sleep(Duration::from_secs(2)).await;
        notice.raise("second");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(notice.current().as_deref(), Some("second"));
    }

    #[test]
    fn test_raise_and_clear() {
        let notice = ErrorNotice::new();
        notice.raise("boom");
        assert_eq!(notice.current().as_deref(), Some("boom"));
        notice.clear();
        assert_eq!(notice.current(), None);
    }
}
