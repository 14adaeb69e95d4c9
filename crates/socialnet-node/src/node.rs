//! Node lifecycle and state machine.
//!
//! The [`Node`] owns the social service and its two background tasks:
//! the notification worker and the retention sweep.
//!
//! # State machine
//!
//! ```text
//! Initializing ──start()──▶ Running ──shutdown()──▶ ShuttingDown
//! ```
//!
//! - `Initializing`: components wired, no tasks spawned.
//! - `Running`: worker and sweep active; actions are served.
//! - `ShuttingDown`: queue closed and drained, sweep stopped.
//!
//! Double start and shutdown outside `Running` are rejected with
//! `SocialnetError::ConfigError`.

use std::sync::Arc;

use socialnet_storage::SocialStore;
use socialnet_types::config::AppConfig;
use socialnet_types::{Result, SocialnetError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::admission::{AdmissionConfig, AdmissionController};
use crate::pipeline::{pipeline, NotificationWorker, PipelineConfig, PipelineStats};
use crate::retention::{RetentionConfig, RetentionSweep};
use crate::service::SocialService;

// ---------------------------------------------------------------------------
// NodeState
// ---------------------------------------------------------------------------

/// Lifecycle state of the node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeState {
    /// Components created, background tasks not started.
    Initializing,
    /// Background tasks are running.
    Running,
    /// Graceful shutdown in progress or finished.
    ShuttingDown,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Owns the service and drives the background tasks.
///
/// After [`Node::new`], call [`Node::start`] from inside a tokio runtime,
/// serve actions through [`Node::service`], and finish with
/// [`Node::shutdown`].
pub struct Node<S> {
    state: NodeState,
    service: Arc<SocialService<S>>,
    /// Moved into its task by `start()`.
    worker: Option<NotificationWorker<S>>,
    /// Moved into its task by `start()`.
    sweep: Option<RetentionSweep<S>>,
    shutdown_tx: watch::Sender<bool>,
    worker_handle: Option<JoinHandle<PipelineStats>>,
    sweep_handle: Option<JoinHandle<()>>,
}

impl<S: SocialStore + 'static> Node<S> {
    /// Validates `config` and wires every component over `store`.
    pub fn new(config: &AppConfig, store: Arc<S>) -> Result<Self> {
        config.validate()?;

        let admission = Arc::new(AdmissionController::new(AdmissionConfig::from(config)));
        let (dispatcher, worker) = pipeline(&PipelineConfig::from(config), Arc::clone(&store));
        let sweep = RetentionSweep::new(Arc::clone(&store), RetentionConfig::from(config));
        let service = Arc::new(SocialService::new(store, admission, dispatcher));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            state: NodeState::Initializing,
            service,
            worker: Some(worker),
            sweep: Some(sweep),
            shutdown_tx,
            worker_handle: None,
            sweep_handle: None,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Shared handle to the action surface.
    pub fn service(&self) -> Arc<SocialService<S>> {
        Arc::clone(&self.service)
    }

    /// Spawns the notification worker and the retention sweep.
    pub fn start(&mut self) -> Result<()> {
        if self.state != NodeState::Initializing {
            return Err(SocialnetError::ConfigError {
                reason: format!("cannot start node in state {}", self.state),
            });
        }

        let (Some(worker), Some(sweep)) = (self.worker.take(), self.sweep.take()) else {
            return Err(SocialnetError::Internal {
                reason: "node components already consumed".into(),
            });
        };

        self.worker_handle = Some(tokio::spawn(worker.run(self.shutdown_tx.subscribe())));
        self.sweep_handle = Some(tokio::spawn(sweep.run(self.shutdown_tx.subscribe())));
        self.state = NodeState::Running;

        tracing::info!("node started");
        Ok(())
    }

    /// Stops accepting notifications, drains the queue, stops the sweep
    /// and returns the worker's delivery totals.
    pub async fn shutdown(&mut self) -> Result<PipelineStats> {
        if self.state != NodeState::Running {
            return Err(SocialnetError::ConfigError {
                reason: format!("cannot shut down node in state {}", self.state),
            });
        }

        tracing::info!("initiating graceful shutdown");
        self.state = NodeState::ShuttingDown;
        let _ = self.shutdown_tx.send(true);

        let stats = match self.worker_handle.take() {
            Some(handle) => handle.await.map_err(|e| SocialnetError::Internal {
                reason: format!("notification worker failed: {e}"),
            })?,
            None => PipelineStats::default(),
        };

        if let Some(handle) = self.sweep_handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(%e, "retention sweep task failed");
            }
        }

        tracing::info!(
            delivered = stats.delivered,
            failed = stats.failed,
            dropped = self.service.dropped_notifications(),
            "node stopped"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use socialnet_storage::MemoryStore;

    use super::*;

    fn node() -> Result<Node<MemoryStore>> {
        Node::new(&AppConfig::default(), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn invalid_config_rejected() {
        let config = AppConfig {
            notification_buffer: 0,
            ..AppConfig::default()
        };
        let result = Node::new(&config, Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(SocialnetError::ConfigError { .. })));
    }

    #[tokio::test]
    async fn lifecycle_transitions() -> Result<()> {
        let mut node = node()?;
        assert_eq!(node.state(), NodeState::Initializing);

        node.start()?;
        assert_eq!(node.state(), NodeState::Running);
        assert!(node.start().is_err());

        let stats = node.shutdown().await?;
        assert_eq!(stats, PipelineStats::default());
        assert_eq!(node.state(), NodeState::ShuttingDown);
        assert!(node.shutdown().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_before_start_rejected() -> Result<()> {
        let mut node = node()?;
        assert!(matches!(
            node.shutdown().await,
            Err(SocialnetError::ConfigError { .. })
        ));
        Ok(())
    }

    #[test]
    fn state_display() {
        assert_eq!(NodeState::Running.to_string(), "running");
        assert_eq!(NodeState::ShuttingDown.to_string(), "shutting_down");
    }
}
