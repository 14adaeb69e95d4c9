//! Feed assembly.
//!
//! A viewer sees their own posts and those of everyone they are friends
//! with, newest first. Visibility is computed from graph state at call
//! time; nothing is cached or precomputed.

use std::cmp::Reverse;
use std::sync::Arc;

use socialnet_storage::{GraphStore, PostStore, UserStore};
use socialnet_types::{FeedEntry, Post, Result, UserId};

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// A finished, single-pass feed.
///
/// Consumed by iteration; assemble again for a fresh view.
#[derive(Debug)]
pub struct Feed {
    entries: std::vec::IntoIter<FeedEntry>,
}

impl Feed {
    fn new(entries: Vec<FeedEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }

    /// A feed with no entries.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for Feed {
    type Item = FeedEntry;

    fn next(&mut self) -> Option<FeedEntry> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Feed {}

// ---------------------------------------------------------------------------
// FeedAssembler
// ---------------------------------------------------------------------------

/// Builds feeds from graph and post state.
pub struct FeedAssembler<S> {
    store: Arc<S>,
}

impl<S> Clone for FeedAssembler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GraphStore + PostStore + UserStore> FeedAssembler<S> {
    /// Wraps a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Assembles up to `limit` entries visible to `viewer`, ordered by
    /// creation time descending with ties broken by post id descending.
    ///
    /// An unknown viewer or a zero limit yields an empty feed.
    pub fn assemble(&self, viewer: UserId, limit: usize) -> Result<Feed> {
        if limit == 0 || !self.store.user_exists(viewer)? {
            return Ok(Feed::empty());
        }

        let mut visible = self.store.accepted_friends_of(viewer)?;
        visible.insert(viewer);

        let mut posts = self.store.posts_by_authors(&visible, limit)?;
        posts.sort_by_key(|p| Reverse((p.created_at, p.id)));
        posts.truncate(limit);

        let mut entries = Vec::with_capacity(posts.len());
        for post in posts {
            entries.push(self.project(post, viewer)?);
        }

        tracing::debug!(
            viewer = %viewer,
            authors = visible.len(),
            entries = entries.len(),
            "feed assembled"
        );
        Ok(Feed::new(entries))
    }

    /// Projects one post for `viewer` with its current like state.
    pub fn project(&self, post: Post, viewer: UserId) -> Result<FeedEntry> {
        Ok(FeedEntry {
            like_count: self.store.like_count(post.id)?,
            liked_by_viewer: self.store.has_liked(post.id, viewer)?,
            post_id: post.id,
            author: post.author,
            created_at: post.created_at,
            content: post.content,
        })
    }
}
