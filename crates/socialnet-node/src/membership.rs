//! Group membership rules.
//!
//! Membership is a set of `(group, user)` edges. The owner joins on
//! creation and can never leave.

use std::sync::Arc;

use socialnet_storage::GroupStore;
use socialnet_types::{Group, GroupId, Result, SocialnetError, Timestamp, UserId};

/// Group membership operations over a group store.
pub struct Membership<S> {
    store: Arc<S>,
}

impl<S> Clone for Membership<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GroupStore> Membership<S> {
    /// Wraps a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates a group owned by `owner`, who becomes its first member.
    pub fn create_group(&self, owner: UserId, title: &str, description: &str) -> Result<Group> {
        let group = self
            .store
            .create_group(owner, title, description, Timestamp::now())?;
        tracing::info!(group = %group.id, owner = %owner, "group created");
        Ok(group)
    }

    /// Adds `user` to the group.
    ///
    /// # Errors
    ///
    /// [`SocialnetError::NotFound`] or [`SocialnetError::AlreadyMember`].
    pub fn join_group(&self, group: GroupId, user: UserId) -> Result<()> {
        self.require_group(group)?;
        if !self.store.add_member(group, user)? {
            return Err(SocialnetError::AlreadyMember);
        }
        tracing::debug!(group = %group, user = %user, "joined group");
        Ok(())
    }

    /// Removes `user` from the group.
    ///
    /// # Errors
    ///
    /// [`SocialnetError::NotFound`], [`SocialnetError::OwnerCannotLeave`]
    /// or [`SocialnetError::NotMember`].
    pub fn leave_group(&self, group: GroupId, user: UserId) -> Result<()> {
        let record = self.require_group(group)?;
        if record.owner == user {
            return Err(SocialnetError::OwnerCannotLeave);
        }
        if !self.store.remove_member(group, user)? {
            return Err(SocialnetError::NotMember);
        }
        tracing::debug!(group = %group, user = %user, "left group");
        Ok(())
    }

    /// Whether `user` belongs to the group.
    pub fn is_member(&self, group: GroupId, user: UserId) -> Result<bool> {
        self.store.is_member(group, user)
    }

    /// Fails with [`SocialnetError::NotMember`] unless `user` belongs to
    /// an existing group.
    pub fn require_member(&self, group: GroupId, user: UserId) -> Result<Group> {
        let record = self.require_group(group)?;
        if !self.store.is_member(group, user)? {
            return Err(SocialnetError::NotMember);
        }
        Ok(record)
    }

    fn require_group(&self, group: GroupId) -> Result<Group> {
        self.store
            .get_group(group)?
            .ok_or_else(|| SocialnetError::not_found(format!("group {group}")))
    }
}
