//! Fire-and-forget background work.
//!
//! Reconciliation must never block the caller: navigation returns
//! immediately and the refresh happens behind it. Jobs are handed to a
//! dispatcher over a channel and each runs on its own tokio task. Callers get
//! no handle back; `wait_idle` exists for shutdown and tests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

struct Job {
    label: &'static str,
    fut: BoxFuture<'static, ()>,
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count even if the job panics.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Handle for submitting background jobs. Cheap to clone.
#[derive(Clone)]
pub struct BackgroundTasks {
    tx: mpsc::UnboundedSender<Job>,
    in_flight: Arc<InFlight>,
}

impl BackgroundTasks {
    /// Start the dispatcher. Must be called within a tokio runtime.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let in_flight = Arc::new(InFlight::default());

        let dispatcher = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                debug!(job = job.label, "Dispatching background job");
                tokio::spawn(job.fut);
            }
            debug!("Background dispatcher stopped");
        });

        (Self { tx, in_flight }, dispatcher)
    }

    /// Queue a job. Never blocks and never fails from the caller's view.
    pub fn submit<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.in_flight.count.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(self.in_flight.clone());
        let fut = async move {
            let _guard = guard;
            fut.await;
        }
        .instrument(tracing::debug_span!("background", job = label))
        .boxed();

        if let Err(e) = self.tx.send(Job { label, fut }) {
            // Dropping the rejected job drops its guard
            warn!(job = e.0.label, "Background dispatcher is gone, dropping job");
        }
    }

    /// Number of submitted jobs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until every submitted job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
