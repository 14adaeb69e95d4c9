//! Friendship lifecycle.
//!
//! ```text
//! request ──▶ Pending ──accept (addressee)──▶ Accepted
//!                └─────block (addressee)───▶ Blocked
//! ```
//!
//! Edges are directed and owned by the requester. Lookups between a pair
//! ignore direction; only the addressee may resolve an edge. The pending
//! uniqueness rule and the accepted-pair rule are enforced by the store
//! atomically with edge creation, and resolution is a compare-and-set on
//! `Pending`, so racing requests or responses cannot both win.

use std::collections::BTreeSet;
use std::sync::Arc;

use socialnet_storage::{GraphStore, StatusUpdate, UserStore};
use socialnet_types::{
    resolved_relationship, EdgeId, FriendDecision, FriendEdge, FriendStatus, Result,
    SocialnetError, Timestamp, UserId,
};

/// Friendship operations over a graph store.
pub struct SocialGraph<S> {
    store: Arc<S>,
}

impl<S> Clone for SocialGraph<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GraphStore + UserStore> SocialGraph<S> {
    /// Wraps a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Opens a pending request from `requester` to `addressee`.
    ///
    /// # Errors
    ///
    /// - [`SocialnetError::SelfReference`] if both are the same user.
    /// - [`SocialnetError::NotFound`] if the addressee does not exist.
    /// - [`SocialnetError::AlreadyConnected`] if the pair are friends.
    /// - [`SocialnetError::RequestPending`] if a request between the pair
    ///   is already open, in either direction.
    pub fn request_friendship(&self, requester: UserId, addressee: UserId) -> Result<FriendEdge> {
        if requester == addressee {
            return Err(SocialnetError::SelfReference);
        }
        if !self.store.user_exists(addressee)? {
            return Err(SocialnetError::not_found(format!("user {addressee}")));
        }

        let edge = self
            .store
            .create_friend_edge(requester, addressee, Timestamp::now())?;
        tracing::info!(
            edge = %edge.id,
            requester = %requester,
            addressee = %addressee,
            "friend request opened"
        );
        Ok(edge)
    }

    /// Resolves a pending request.
    ///
    /// # Errors
    ///
    /// - [`SocialnetError::NotFound`] if the edge does not exist.
    /// - [`SocialnetError::Unauthorized`] if `respondent` is not the
    ///   addressee.
    /// - [`SocialnetError::AlreadyResolved`] if the edge already left
    ///   `Pending`, including when a concurrent response won the race.
    pub fn respond_to_request(
        &self,
        edge_id: EdgeId,
        respondent: UserId,
        decision: FriendDecision,
    ) -> Result<FriendEdge> {
        let edge = self
            .store
            .get_friend_edge(edge_id)?
            .ok_or_else(|| SocialnetError::not_found(format!("friend request {edge_id}")))?;

        if !edge.is_addressee(respondent) {
            return Err(SocialnetError::unauthorized(
                "only the addressee can respond to a friend request",
            ));
        }
        if edge.status != FriendStatus::Pending {
            return Err(SocialnetError::AlreadyResolved);
        }

        let next = decision.target_status();
        match self.store.update_friend_edge_status(
            edge_id,
            FriendStatus::Pending,
            next,
            Timestamp::now(),
        )? {
            StatusUpdate::Updated(edge) => {
                tracing::info!(edge = %edge_id, status = %next, "friend request resolved");
                Ok(edge)
            }
            StatusUpdate::Conflict(_) => Err(SocialnetError::AlreadyResolved),
            StatusUpdate::Missing => {
                Err(SocialnetError::not_found(format!("friend request {edge_id}")))
            }
        }
    }

    /// Whether `a` and `b` are friends. Symmetric; a user is never their
    /// own friend.
    pub fn are_friends(&self, a: UserId, b: UserId) -> Result<bool> {
        if a == b {
            return Ok(false);
        }
        let edges = self.store.edges_of(a)?;
        let between = edges.iter().filter(|e| e.involves(a, b));
        Ok(resolved_relationship(between) == Some(FriendStatus::Accepted))
    }

    /// Everyone `user` is friends with.
    pub fn friends_of(&self, user: UserId) -> Result<BTreeSet<UserId>> {
        self.store.accepted_friends_of(user)
    }

    /// Requests awaiting `user`'s response, oldest first.
    pub fn pending_requests(&self, user: UserId) -> Result<Vec<FriendEdge>> {
        Ok(self
            .store
            .edges_of(user)?
            .into_iter()
            .filter(|e| e.status == FriendStatus::Pending && e.is_addressee(user))
            .collect())
    }
}
