//! Friendship edge persistence.
//!
//! Edges are directed and never deleted. Two constraints are enforced
//! atomically inside the edge table's critical section, the way a
//! relational backend would enforce them with a transaction and a unique
//! index on the normalized pair:
//!
//! - at most one `pending` edge per unordered pair;
//! - no new edge while the pair's effective relationship is `accepted`.
//!
//! Status changes are compare-and-set on the expected current status, so
//! two racing responses to the same edge cannot both succeed.

use std::collections::{BTreeMap, BTreeSet};

use socialnet_types::{
    resolved_relationship, EdgeId, FriendEdge, FriendStatus, Result, SocialnetError, Timestamp,
    UserId,
};

use crate::engine::{allocate, lock, MemoryStore};

/// Outcome of [`GraphStore::update_friend_edge_status`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The edge held the expected status and was moved.
    Updated(FriendEdge),
    /// The edge exists but held this status instead.
    Conflict(FriendStatus),
    /// No such edge.
    Missing,
}

/// Friendship edge storage.
pub trait GraphStore: Send + Sync {
    /// Creates a pending edge from `requester` to `addressee`.
    ///
    /// # Errors
    ///
    /// - [`SocialnetError::RequestPending`] if a pending edge exists between
    ///   the pair in either direction.
    /// - [`SocialnetError::AlreadyConnected`] if the pair are friends.
    fn create_friend_edge(
        &self,
        requester: UserId,
        addressee: UserId,
        now: Timestamp,
    ) -> Result<FriendEdge>;

    /// Returns the edge, if it exists.
    fn get_friend_edge(&self, id: EdgeId) -> Result<Option<FriendEdge>>;

    /// Moves the edge from `expected` to `next` if it currently holds
    /// `expected`.
    fn update_friend_edge_status(
        &self,
        id: EdgeId,
        expected: FriendStatus,
        next: FriendStatus,
        now: Timestamp,
    ) -> Result<StatusUpdate>;

    /// Every edge with `user` at either end, oldest first.
    fn edges_of(&self, user: UserId) -> Result<Vec<FriendEdge>>;

    /// Users whose effective relationship with `user` is `accepted`.
    fn accepted_friends_of(&self, user: UserId) -> Result<BTreeSet<UserId>> {
        let mut by_counterpart: BTreeMap<UserId, Vec<FriendEdge>> = BTreeMap::new();
        for edge in self.edges_of(user)? {
            if let Some(other) = edge.counterpart(user) {
                by_counterpart.entry(other).or_default().push(edge);
            }
        }

        Ok(by_counterpart
            .into_iter()
            .filter(|(_, edges)| resolved_relationship(edges) == Some(FriendStatus::Accepted))
            .map(|(other, _)| other)
            .collect())
    }
}

impl GraphStore for MemoryStore {
    fn create_friend_edge(
        &self,
        requester: UserId,
        addressee: UserId,
        now: Timestamp,
    ) -> Result<FriendEdge> {
        let mut table = lock(&self.edges, "edges")?;

        let between: Vec<&FriendEdge> = table
            .by_user
            .get(&requester)
            .into_iter()
            .flatten()
            .filter_map(|id| table.rows.get(id))
            .filter(|edge| edge.involves(requester, addressee))
            .collect();

        if let Some(open) = between.iter().find(|e| e.status == FriendStatus::Pending) {
            return Err(SocialnetError::RequestPending { edge: open.id });
        }
        if resolved_relationship(between) == Some(FriendStatus::Accepted) {
            return Err(SocialnetError::AlreadyConnected);
        }

        let id = EdgeId::new(allocate(&mut table.next_id));
        let edge = FriendEdge {
            id,
            requester,
            addressee,
            status: FriendStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, edge.clone());
        table.by_user.entry(requester).or_default().push(id);
        table.by_user.entry(addressee).or_default().push(id);
        Ok(edge)
    }

    fn get_friend_edge(&self, id: EdgeId) -> Result<Option<FriendEdge>> {
        Ok(lock(&self.edges, "edges")?.rows.get(&id).cloned())
    }

    fn update_friend_edge_status(
        &self,
        id: EdgeId,
        expected: FriendStatus,
        next: FriendStatus,
        now: Timestamp,
    ) -> Result<StatusUpdate> {
        let mut table = lock(&self.edges, "edges")?;
        let Some(edge) = table.rows.get_mut(&id) else {
            return Ok(StatusUpdate::Missing);
        };
        if edge.status != expected {
            return Ok(StatusUpdate::Conflict(edge.status));
        }

        edge.status = next;
        edge.updated_at = now;
        Ok(StatusUpdate::Updated(edge.clone()))
    }

    fn edges_of(&self, user: UserId) -> Result<Vec<FriendEdge>> {
        let table = lock(&self.edges, "edges")?;
        Ok(table
            .by_user
            .get(&user)
            .into_iter()
            .flatten()
            .filter_map(|id| table.rows.get(id).cloned())
            .collect())
    }
}
