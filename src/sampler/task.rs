//! Generic cancellable periodic execution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

/// A schedulable action driven by a [`RepeatingTask`].
///
/// Implementations carry their own state; the task only decides when to run
/// them and what to do when a run fails.
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    /// Short identifier used in log lines.
    fn name(&self) -> &str;

    /// Execute one iteration of the job.
    async fn run(&self) -> Result<()>;
}

/// Cancellable background executor for a [`PeriodicJob`].
///
/// Runs the job immediately on spawn, then sleeps `period` between
/// invocations. A failed run is logged, counted and discarded; the loop
/// always proceeds to its next invocation, since a transient failure must
/// not kill the monitoring process.
///
/// Cancellation races the inter-run sleep against a watch channel, so
/// [`RepeatingTask::stop`] takes effect without waiting out the period and
/// no further run starts afterward.
pub struct RepeatingTask {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    errors: Arc<AtomicU64>,
}

impl RepeatingTask {
    pub fn spawn(job: Arc<dyn PeriodicJob>, period: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let errors = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&errors);

        let handle = tokio::spawn(async move {
            loop {
                if *stop_rx.borrow() {
                    break;
                }

                if let Err(e) = job.run().await {
                    counter.fetch_add(1, Ordering::Relaxed);
                    warn!(job = job.name(), error = %e, "periodic job run failed");
                }

                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = stop_rx.changed() => {}
                }
            }
            debug!(job = job.name(), "periodic job stopped");
        });

        Self {
            stop_tx,
            handle: Some(handle),
            errors,
        }
    }

    /// Number of job runs that have failed so far.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Stop the task and wait for the background loop to terminate. No
    /// further run begins once this has been called.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
