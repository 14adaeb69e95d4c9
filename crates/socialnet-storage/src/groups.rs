//! Groups, membership and group posts.

use std::cmp::Reverse;

use socialnet_types::{Group, GroupId, GroupPost, GroupPostId, Result, SocialnetError, Timestamp, UserId};

use crate::engine::{allocate, lock, MemoryStore};

/// Group storage. Membership has set semantics.
pub trait GroupStore: Send + Sync {
    /// Creates the group and adds `owner` as its first member in one step.
    fn create_group(
        &self,
        owner: UserId,
        title: &str,
        description: &str,
        now: Timestamp,
    ) -> Result<Group>;

    /// Returns the group, if it exists.
    fn get_group(&self, id: GroupId) -> Result<Option<Group>>;

    /// Adds a member. Returns `false` if already a member.
    fn add_member(&self, group: GroupId, user: UserId) -> Result<bool>;

    /// Removes a member. Returns `false` if not a member.
    fn remove_member(&self, group: GroupId, user: UserId) -> Result<bool>;

    /// Whether `user` is a member.
    fn is_member(&self, group: GroupId, user: UserId) -> Result<bool>;

    /// Number of members.
    fn member_count(&self, group: GroupId) -> Result<usize>;

    /// Groups `user` belongs to.
    fn groups_of(&self, user: UserId) -> Result<Vec<Group>>;

    /// Stores a post in the group.
    fn create_group_post(
        &self,
        group: GroupId,
        author: UserId,
        content: &str,
        now: Timestamp,
    ) -> Result<GroupPost>;

    /// Group posts, newest first, at most `limit`.
    fn group_posts(&self, group: GroupId, limit: usize) -> Result<Vec<GroupPost>>;
}

impl GroupStore for MemoryStore {
    fn create_group(
        &self,
        owner: UserId,
        title: &str,
        description: &str,
        now: Timestamp,
    ) -> Result<Group> {
        let mut table = lock(&self.groups, "groups")?;
        let id = GroupId::new(allocate(&mut table.next_id));
        let group = Group {
            id,
            owner,
            title: title.to_owned(),
            description: description.to_owned(),
            created_at: now,
        };
        table.rows.insert(id, group.clone());
        table.members.entry(id).or_default().insert(owner);
        Ok(group)
    }

    fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        Ok(lock(&self.groups, "groups")?.rows.get(&id).cloned())
    }

    fn add_member(&self, group: GroupId, user: UserId) -> Result<bool> {
        let mut table = lock(&self.groups, "groups")?;
        if !table.rows.contains_key(&group) {
            return Err(SocialnetError::not_found(format!("group {group}")));
        }
        Ok(table.members.entry(group).or_default().insert(user))
    }

    fn remove_member(&self, group: GroupId, user: UserId) -> Result<bool> {
        let mut table = lock(&self.groups, "groups")?;
        Ok(table
            .members
            .get_mut(&group)
            .map(|members| members.remove(&user))
            .unwrap_or(false))
    }

    fn is_member(&self, group: GroupId, user: UserId) -> Result<bool> {
        let table = lock(&self.groups, "groups")?;
        Ok(table
            .members
            .get(&group)
            .is_some_and(|members| members.contains(&user)))
    }

    fn member_count(&self, group: GroupId) -> Result<usize> {
        let table = lock(&self.groups, "groups")?;
        Ok(table.members.get(&group).map_or(0, |members| members.len()))
    }

    fn groups_of(&self, user: UserId) -> Result<Vec<Group>> {
        let table = lock(&self.groups, "groups")?;
        Ok(table
            .rows
            .values()
            .filter(|g| {
                table
                    .members
                    .get(&g.id)
                    .is_some_and(|members| members.contains(&user))
            })
            .cloned()
            .collect())
    }

    fn create_group_post(
        &self,
        group: GroupId,
        author: UserId,
        content: &str,
        now: Timestamp,
    ) -> Result<GroupPost> {
        let mut table = lock(&self.groups, "groups")?;
        if !table.rows.contains_key(&group) {
            return Err(SocialnetError::not_found(format!("group {group}")));
        }
        let id = GroupPostId::new(allocate(&mut table.next_post_id));
        let post = GroupPost {
            id,
            group_id: group,
            author,
            content: content.to_owned(),
            created_at: now,
        };
        table.posts.insert(id, post.clone());
        Ok(post)
    }

    fn group_posts(&self, group: GroupId, limit: usize) -> Result<Vec<GroupPost>> {
        let table = lock(&self.groups, "groups")?;
        let mut posts: Vec<GroupPost> = table
            .posts
            .values()
            .filter(|p| p.group_id == group)
            .cloned()
            .collect();
        drop(table);

        posts.sort_by_key(|p| Reverse((p.created_at, p.id)));
        posts.truncate(limit);
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_first_member() -> Result<()> {
        let store = MemoryStore::new();
        let owner = UserId::new(1);
        let group = store.create_group(owner, "rustaceans", "", Timestamp::now())?;

        assert!(store.is_member(group.id, owner)?);
        assert_eq!(store.member_count(group.id)?, 1);
        assert_eq!(store.groups_of(owner)?, vec![group]);
        Ok(())
    }

    #[test]
    fn membership_is_a_set() -> Result<()> {
        let store = MemoryStore::new();
        let group = store.create_group(UserId::new(1), "g", "", Timestamp::now())?;
        let member = UserId::new(2);

        assert!(store.add_member(group.id, member)?);
        assert!(!store.add_member(group.id, member)?);
        assert_eq!(store.member_count(group.id)?, 2);

        assert!(store.remove_member(group.id, member)?);
        assert!(!store.remove_member(group.id, member)?);
        assert!(!store.is_member(group.id, member)?);
        Ok(())
    }

    #[test]
    fn join_missing_group_is_not_found() {
        let store = MemoryStore::new();
        let result = store.add_member(GroupId::new(3), UserId::new(1));
        assert!(matches!(result, Err(SocialnetError::NotFound { .. })));
    }
}
