//! Bounded notification pipeline.
//!
//! Action handlers hand [`NotificationTask`]s to a [`Dispatcher`]; a single
//! [`NotificationWorker`] persists them in FIFO order. The buffer is a
//! bounded `tokio::sync::mpsc` channel:
//!
//! - [`Dispatcher::enqueue_with_deadline`] waits for space, up to the
//!   deadline, then fails with [`SocialnetError::QueueTimeout`].
//! - [`Dispatcher::try_enqueue`] never waits and fails with
//!   [`SocialnetError::QueueFull`].
//! - Once the worker has stopped, both fail with
//!   [`SocialnetError::QueueClosed`].
//!
//! On shutdown the worker closes the channel, persists everything still
//! buffered, and returns its [`PipelineStats`]. Tasks buffered when the
//! process dies are lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socialnet_storage::NotificationStore;
use socialnet_types::config::AppConfig;
use socialnet_types::{NotificationTask, Result, SocialnetError, Timestamp};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Queue sizing and enqueue deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Channel capacity.
    pub buffer: usize,
    /// Deadline used by [`Dispatcher::enqueue`].
    pub enqueue_timeout: Duration,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            buffer: config.notification_buffer,
            enqueue_timeout: config.enqueue_timeout,
        }
    }
}

/// Creates a connected dispatcher and worker.
///
/// A zero `buffer` is raised to one, the smallest capacity the channel
/// accepts.
pub fn pipeline<S: NotificationStore>(
    config: &PipelineConfig,
    store: Arc<S>,
) -> (Dispatcher, NotificationWorker<S>) {
    let (tx, rx) = mpsc::channel(config.buffer.max(1));
    let dispatcher = Dispatcher {
        tx,
        default_timeout: config.enqueue_timeout,
        counters: Arc::new(DispatchCounters::default()),
    };
    let worker = NotificationWorker { rx, store };
    (dispatcher, worker)
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DispatchCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

/// Producer side of the pipeline. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    tx: mpsc::Sender<NotificationTask>,
    default_timeout: Duration,
    counters: Arc<DispatchCounters>,
}

impl Dispatcher {
    /// Enqueues with the configured default deadline.
    pub async fn enqueue(&self, task: NotificationTask) -> Result<()> {
        self.enqueue_with_deadline(task, self.default_timeout).await
    }

    /// Enqueues, waiting at most `deadline` for buffer space.
    ///
    /// On timeout the task is dropped.
    pub async fn enqueue_with_deadline(
        &self,
        task: NotificationTask,
        deadline: Duration,
    ) -> Result<()> {
        let outcome = match tokio::time::timeout(deadline, self.tx.send(task)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SocialnetError::QueueClosed),
            Err(_) => Err(SocialnetError::QueueTimeout { waited: deadline }),
        };
        self.record(&outcome);
        outcome
    }

    /// Enqueues only if space is available right now.
    pub fn try_enqueue(&self, task: NotificationTask) -> Result<()> {
        let outcome = match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SocialnetError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(SocialnetError::QueueClosed),
        };
        self.record(&outcome);
        outcome
    }

    /// Free slots in the buffer.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    /// Whether the worker has stopped accepting tasks.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Tasks accepted into the buffer so far.
    pub fn accepted(&self) -> u64 {
        self.counters.accepted.load(Ordering::Relaxed)
    }

    /// Enqueue attempts that failed so far.
    pub fn rejected(&self) -> u64 {
        self.counters.rejected.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: &Result<()>) {
        let counter = match outcome {
            Ok(()) => &self.counters.accepted,
            Err(_) => &self.counters.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// NotificationWorker
// ---------------------------------------------------------------------------

/// Delivery totals reported by a stopped worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Tasks persisted.
    pub delivered: u64,
    /// Tasks whose persist call failed.
    pub failed: u64,
}

/// Single consumer of the pipeline.
pub struct NotificationWorker<S> {
    rx: mpsc::Receiver<NotificationTask>,
    store: Arc<S>,
}

impl<S: NotificationStore> NotificationWorker<S> {
    /// Persists tasks until `shutdown` flips to `true` (or its sender is
    /// dropped) or every dispatcher is gone, then drains the buffer.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PipelineStats {
        tracing::info!("notification worker started");
        let mut stats = PipelineStats::default();

        if !*shutdown.borrow() {
            loop {
                tokio::select! {
                    maybe_task = self.rx.recv() => match maybe_task {
                        Some(task) => self.deliver(task, &mut stats),
                        None => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        }

        self.rx.close();
        let mut drained = 0u64;
        while let Some(task) = self.rx.recv().await {
            self.deliver(task, &mut stats);
            drained += 1;
        }

        tracing::info!(
            delivered = stats.delivered,
            failed = stats.failed,
            drained,
            "notification worker stopped"
        );
        stats
    }

    fn deliver(&self, task: NotificationTask, stats: &mut PipelineStats) {
        match self.store.create_notification(&task, Timestamp::now()) {
            Ok(notification) => {
                stats.delivered += 1;
                tracing::trace!(
                    id = %notification.id,
                    recipient = %task.recipient,
                    kind = %task.kind,
                    "notification persisted"
                );
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(
                    %e,
                    recipient = %task.recipient,
                    kind = %task.kind,
                    "failed to persist notification"
                );
            }
        }
    }
}
