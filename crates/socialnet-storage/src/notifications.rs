//! Persisted notifications.
//!
//! Written only by the pipeline consumer, read by the recipient, pruned
//! by the retention sweep.

use socialnet_types::{
    Notification, NotificationId, NotificationTask, Result, Timestamp, UserId,
};

use crate::engine::{allocate, lock, MemoryStore};

/// Notification storage.
pub trait NotificationStore: Send + Sync {
    /// Persists a task as an unread notification.
    fn create_notification(&self, task: &NotificationTask, now: Timestamp) -> Result<Notification>;

    /// The recipient's notifications, newest first, at most `limit`.
    fn notifications_for(&self, user: UserId, limit: usize) -> Result<Vec<Notification>>;

    /// Returns the notification, if it exists.
    fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>>;

    /// Marks the notification read. Returns `false` if it does not exist.
    fn mark_read(&self, id: NotificationId) -> Result<bool>;

    /// Unread notifications for `user`.
    fn unread_count(&self, user: UserId) -> Result<u64>;

    /// Deletes notifications that are read and created before `cutoff`.
    /// Returns how many were removed.
    fn delete_read_older_than(&self, cutoff: Timestamp) -> Result<u64>;

    /// Deletes every notification for `user`. Returns how many were removed.
    fn clear_notifications(&self, user: UserId) -> Result<u64>;
}

impl NotificationStore for MemoryStore {
    fn create_notification(&self, task: &NotificationTask, now: Timestamp) -> Result<Notification> {
        let mut table = lock(&self.notifications, "notifications")?;
        let id = NotificationId::new(allocate(&mut table.next_id));
        let notification = Notification {
            id,
            recipient: task.recipient,
            kind: task.kind,
            target_id: task.target_id,
            message: task.message.clone(),
            read: false,
            created_at: now,
        };
        table.rows.insert(id, notification.clone());
        Ok(notification)
    }

    fn notifications_for(&self, user: UserId, limit: usize) -> Result<Vec<Notification>> {
        let table = lock(&self.notifications, "notifications")?;
        let mut rows: Vec<Notification> = table
            .rows
            .values()
            .filter(|n| n.recipient == user)
            .cloned()
            .collect();
        drop(table);

        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>> {
        Ok(lock(&self.notifications, "notifications")?
            .rows
            .get(&id)
            .cloned())
    }

    fn mark_read(&self, id: NotificationId) -> Result<bool> {
        let mut table = lock(&self.notifications, "notifications")?;
        match table.rows.get_mut(&id) {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn unread_count(&self, user: UserId) -> Result<u64> {
        let table = lock(&self.notifications, "notifications")?;
        Ok(table
            .rows
            .values()
            .filter(|n| n.recipient == user && !n.read)
            .count() as u64)
    }

    fn delete_read_older_than(&self, cutoff: Timestamp) -> Result<u64> {
        let mut table = lock(&self.notifications, "notifications")?;
        let before = table.rows.len();
        table.rows.retain(|_, n| !(n.read && n.created_at < cutoff));
        let removed = (before - table.rows.len()) as u64;
        tracing::debug!(removed, remaining = table.rows.len(), "expired notifications deleted");
        Ok(removed)
    }

    fn clear_notifications(&self, user: UserId) -> Result<u64> {
        let mut table = lock(&self.notifications, "notifications")?;
        let before = table.rows.len();
        table.rows.retain(|_, n| n.recipient != user);
        Ok((before - table.rows.len()) as u64)
    }
}
