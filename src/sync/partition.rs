//! Per-region single-writer actors.
//!
//! Each [`RegionIdentifier`] owns one mailbox task that runs submitted jobs
//! strictly one after another. All profile mutations for a session go
//! through its region's mailbox, so at most one mutation is in flight per
//! profile within that region.
//!
//! Mailboxes of different regions are independent. The same profile served
//! through two regions is not coordinated here; storage revision checks are
//! the only guard between them.
//!
//! A mailbox that stays idle for the registry's idle timeout removes itself;
//! the next job for its region spawns a fresh one.

use crate::affinity::RegionIdentifier;
use crate::core::{Result, SyncError};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error};

/// Default number of queued jobs per partition before senders wait.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;
/// Default time a mailbox may sit without jobs before it is reclaimed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

type PartitionJob = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;
type MailboxMap = Mutex<HashMap<RegionIdentifier, PartitionMailbox>>;

struct PartitionMailbox {
    sender: mpsc::Sender<PartitionJob>,
    worker: JoinHandle<()>,
    generation: u64,
}

impl PartitionMailbox {
    fn spawn(
        region: &RegionIdentifier,
        capacity: usize,
        idle_timeout: Duration,
        generation: u64,
        mailboxes: Weak<MailboxMap>,
    ) -> Self {
        let (sender, mut receiver) = mpsc::channel::<PartitionJob>(capacity);
        let region = region.clone();
        let worker = tokio::spawn(async move {
            loop {
                match timeout(idle_timeout, receiver.recv()).await {
                    Ok(Some(job)) => {
                        if AssertUnwindSafe(job()).catch_unwind().await.is_err() {
                            error!(region = %region, "partition job panicked");
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        if reclaim_idle(&mailboxes, &region, generation, &receiver) {
                            debug!(region = %region, "partition idle, reclaimed");
                            return;
                        }
                    }
                }
            }
            debug!(region = %region, "partition mailbox closed");
        });
        Self {
            sender,
            worker,
            generation,
        }
    }
}

/// Removes the mailbox of `region` if it is still this worker's and nobody
/// holds a sender clone or has a job queued.
///
/// Senders are only cloned under the map lock, so the check cannot race a
/// caller that is about to enqueue.
fn reclaim_idle(
    mailboxes: &Weak<MailboxMap>,
    region: &RegionIdentifier,
    generation: u64,
    receiver: &mpsc::Receiver<PartitionJob>,
) -> bool {
    let Some(mailboxes) = mailboxes.upgrade() else {
        return false;
    };
    let mut mailboxes = lock_map(&mailboxes);
    let idle = mailboxes.get(region).is_some_and(|mailbox| {
        mailbox.generation == generation
            && mailbox.sender.strong_count() == 1
            && receiver.is_empty()
    });
    if idle {
        mailboxes.remove(region);
    }
    idle
}

/// Keyed registry of partition mailboxes.
pub struct PartitionRegistry {
    mailboxes: Arc<MailboxMap>,
    capacity: usize,
    idle_timeout: Duration,
    generations: AtomicU64,
}

impl Default for PartitionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

impl PartitionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            mailboxes: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            generations: AtomicU64::new(0),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Runs `job` on the mailbox of `region`, after every job queued before it.
    pub async fn run<F, Fut, T>(&self, region: &RegionIdentifier, job: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: PartitionJob = Box::new(move || {
            async move {
                let _ = reply_tx.send(job().await);
            }
            .boxed()
        });

        if let Err(mpsc::error::SendError(job)) = self.sender_for(region).send(job).await {
            // The worker is gone; sender_for replaces a closed mailbox.
            self.sender_for(region)
                .send(job)
                .await
                .map_err(|_| unavailable(region))?;
        }

        reply_rx.await.map_err(|_| unavailable(region))?
    }

    pub fn partition_count(&self) -> usize {
        self.lock().len()
    }

    /// Closes every mailbox and waits for queued jobs to drain.
    pub async fn shutdown(&self) {
        let mailboxes: Vec<_> = self.lock().drain().map(|(_, mailbox)| mailbox).collect();
        for PartitionMailbox { sender, worker, .. } in mailboxes {
            drop(sender);
            if let Err(err) = worker.await {
                error!(error = %err, "partition worker join failed");
            }
        }
    }

    fn sender_for(&self, region: &RegionIdentifier) -> mpsc::Sender<PartitionJob> {
        let mut mailboxes = self.lock();
        if let Some(mailbox) = mailboxes.get(region) {
            if !mailbox.sender.is_closed() {
                return mailbox.sender.clone();
            }
        }
        debug!(region = %region, "spawning partition mailbox");
        let mailbox = PartitionMailbox::spawn(
            region,
            self.capacity,
            self.idle_timeout,
            self.generations.fetch_add(1, Ordering::Relaxed),
            Arc::downgrade(&self.mailboxes),
        );
        let sender = mailbox.sender.clone();
        mailboxes.insert(region.clone(), mailbox);
        sender
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RegionIdentifier, PartitionMailbox>> {
        lock_map(&self.mailboxes)
    }
}

fn lock_map(mailboxes: &MailboxMap) -> MutexGuard<'_, HashMap<RegionIdentifier, PartitionMailbox>> {
    mailboxes.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(region: &RegionIdentifier) -> SyncError {
    SyncError::PartitionUnavailable {
        region: region.to_string(),
    }
}
