//! Periodic notification retention.
//!
//! Deletes notifications that have been read and are older than the
//! retention horizon. Runs on its own interval, independent of the
//! pipeline. A failed sweep is logged and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use socialnet_storage::NotificationStore;
use socialnet_types::config::AppConfig;
use socialnet_types::{Result, Timestamp};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Sweep cadence and horizon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Read notifications older than this are deleted.
    pub max_age: Duration,
}

impl From<&AppConfig> for RetentionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            interval: config.cleanup_interval,
            max_age: config.notification_max_age,
        }
    }
}

/// The retention task.
pub struct RetentionSweep<S> {
    store: Arc<S>,
    config: RetentionConfig,
}

impl<S: NotificationStore> RetentionSweep<S> {
    /// Creates a sweep over `store`.
    pub fn new(store: Arc<S>, config: RetentionConfig) -> Self {
        Self { store, config }
    }

    /// Runs one sweep against the current time.
    pub fn sweep(&self) -> Result<u64> {
        self.sweep_at(Timestamp::now())
    }

    /// Runs one sweep as if the clock read `now`. Returns how many
    /// notifications were deleted.
    pub fn sweep_at(&self, now: Timestamp) -> Result<u64> {
        let Some(cutoff) = now.checked_sub(self.config.max_age) else {
            return Ok(0);
        };
        self.store.delete_read_older_than(cutoff)
    }

    /// Sweeps every `interval` until `shutdown` flips to `true`.
    ///
    /// The first sweep happens one full interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.interval.max(Duration::from_millis(1));
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?period, max_age = ?self.config.max_age, "retention sweep started");

        loop {
            tokio::select! {
                _ = tick.tick() => match self.sweep() {
                    Ok(0) => tracing::debug!("retention sweep found nothing to delete"),
                    Ok(deleted) => tracing::info!(deleted, "old notifications deleted"),
                    Err(e) => tracing::warn!(%e, "retention sweep failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("retention sweep stopped");
    }
}

#[cfg(test)]
mod tests {
    use socialnet_storage::MemoryStore;
    use socialnet_types::{NotificationKind, NotificationTask, UserId};

    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn sweep_respects_horizon_and_read_flag() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let now = Timestamp::now();
        let eight_days_ago = now.checked_sub(8 * DAY).unwrap_or(now);
        let task = NotificationTask {
            recipient: UserId::new(1),
            kind: NotificationKind::Like,
            target_id: 3,
            message: "liked".into(),
        };

        let old_read = store.create_notification(&task, eight_days_ago)?;
        store.mark_read(old_read.id)?;
        store.create_notification(&task, eight_days_ago)?;
        let recent = store.create_notification(&task, now)?;
        store.mark_read(recent.id)?;

        let sweep = RetentionSweep::new(
            Arc::clone(&store),
            RetentionConfig {
                interval: Duration::from_secs(3600),
                max_age: 7 * DAY,
            },
        );
        assert_eq!(sweep.sweep_at(now)?, 1);
        assert_eq!(sweep.sweep_at(now)?, 0);
        assert_eq!(store.notifications_for(UserId::new(1), 50)?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let sweep = RetentionSweep::new(store, RetentionConfig::from(&AppConfig::default()));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(sweep.run(rx));
        let _ = tx.send(true);
        assert!(handle.await.is_ok());
    }
}
