//! User records, as far as the core needs them.
//!
//! Registration and credentials belong to the identity collaborator; the
//! core checks existence, reads usernames for notification text, and
//! keeps the editable profile.

use socialnet_types::{Result, SocialnetError, Timestamp, User, UserId, UserProfile};

use crate::engine::{allocate, lock, MemoryStore};

/// User lookup and registration.
pub trait UserStore: Send + Sync {
    /// Registers a user. Usernames are unique.
    fn create_user(&self, username: &str, is_admin: bool, now: Timestamp) -> Result<User>;

    /// Returns the user, if registered.
    fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Returns `true` if the user is registered.
    fn user_exists(&self, id: UserId) -> Result<bool> {
        Ok(self.get_user(id)?.is_some())
    }

    /// Replaces the profile fields. Returns `None` if the user is unknown.
    fn update_profile(&self, id: UserId, profile: &UserProfile) -> Result<Option<User>>;

    /// Users whose username or full name contains `term`, ignoring case,
    /// in id order.
    fn search_users(&self, term: &str, limit: usize) -> Result<Vec<User>>;
}

impl UserStore for MemoryStore {
    fn create_user(&self, username: &str, is_admin: bool, now: Timestamp) -> Result<User> {
        let mut table = lock(&self.users, "users")?;
        if table.by_name.contains_key(username) {
            return Err(SocialnetError::InvalidContent {
                reason: format!("username {username:?} is taken"),
            });
        }

        let id = UserId::new(allocate(&mut table.next_id));
        let user = User {
            id,
            username: username.to_owned(),
            full_name: String::new(),
            bio: String::new(),
            avatar_url: String::new(),
            is_admin,
            created_at: now,
        };
        table.by_name.insert(user.username.clone(), id);
        table.rows.insert(id, user.clone());
        Ok(user)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(lock(&self.users, "users")?.rows.get(&id).cloned())
    }

    fn update_profile(&self, id: UserId, profile: &UserProfile) -> Result<Option<User>> {
        let mut table = lock(&self.users, "users")?;
        Ok(table.rows.get_mut(&id).map(|user| {
            user.full_name = profile.full_name.clone();
            user.bio = profile.bio.clone();
            user.avatar_url = profile.avatar_url.clone();
            user.clone()
        }))
    }

    fn search_users(&self, term: &str, limit: usize) -> Result<Vec<User>> {
        let needle = term.to_lowercase();
        let table = lock(&self.users, "users")?;
        Ok(table
            .rows
            .values()
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || u.full_name.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}
