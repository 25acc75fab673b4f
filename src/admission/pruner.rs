use super::controller::{AdmissionController, AdmissionPolicy};
use super::store::BucketStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Shortest accepted pruning period.
const MIN_PRUNE_INTERVAL: Duration = Duration::from_millis(10);

/// Background task that periodically prunes refilled buckets.
///
/// Dropping the handle aborts the task; [`stop`](Self::stop) waits for it.
pub struct BucketPruner {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl BucketPruner {
    pub fn spawn<S>(
        controller: Arc<AdmissionController<S>>,
        policy: Arc<AdmissionPolicy>,
        every: Duration,
    ) -> Self
    where
        S: BucketStore + 'static,
    {
        let every = every.max(MIN_PRUNE_INTERVAL);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let join_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = sleep(every) => {
                        controller.prune(&policy);
                    }
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            let _ = join_handle.await;
        }
    }
}

impl Drop for BucketPruner {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}
