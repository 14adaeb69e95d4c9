//! In-memory storage engine: table ownership and lock management.
//!
//! The [`MemoryStore`] owns one `Mutex` per table so unrelated concerns
//! never contend. Each concern module implements its trait against the
//! table it needs. Ids are allocated per table starting at 1.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use socialnet_types::{
    Comment, CommentId, ConversationId, DirectMessage, EdgeId, FriendEdge, Group, GroupId,
    GroupPost, GroupPostId, MessageId, Notification, NotificationId, Post, PostId, Report,
    ReportId, Result, SocialnetError, User, UserId,
};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct UserTable {
    pub next_id: u64,
    pub rows: BTreeMap<UserId, User>,
    pub by_name: HashMap<String, UserId>,
}

#[derive(Default)]
pub(crate) struct EdgeTable {
    pub next_id: u64,
    pub rows: BTreeMap<EdgeId, FriendEdge>,
    /// Edge ids per endpoint, both directions.
    pub by_user: HashMap<UserId, Vec<EdgeId>>,
}

#[derive(Default)]
pub(crate) struct PostTable {
    pub next_id: u64,
    pub rows: BTreeMap<PostId, Post>,
    pub likes: HashMap<PostId, HashSet<UserId>>,
    pub next_comment_id: u64,
    pub comments: BTreeMap<CommentId, Comment>,
}

#[derive(Default)]
pub(crate) struct GroupTable {
    pub next_id: u64,
    pub rows: BTreeMap<GroupId, Group>,
    pub members: HashMap<GroupId, BTreeSet<UserId>>,
    pub next_post_id: u64,
    pub posts: BTreeMap<GroupPostId, GroupPost>,
}

#[derive(Default)]
pub(crate) struct ConversationTable {
    pub next_id: u64,
    pub members: BTreeMap<ConversationId, Vec<UserId>>,
    /// Direct conversations keyed by normalized pair.
    pub direct: HashMap<(UserId, UserId), ConversationId>,
    pub next_message_id: u64,
    pub messages: BTreeMap<MessageId, DirectMessage>,
}

#[derive(Default)]
pub(crate) struct NotificationTable {
    pub next_id: u64,
    pub rows: BTreeMap<NotificationId, Notification>,
}

#[derive(Default)]
pub(crate) struct ReportTable {
    pub next_id: u64,
    pub rows: BTreeMap<ReportId, Report>,
}

/// Returns the next id for a table, starting at 1.
pub(crate) fn allocate(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Thread-safe in-memory implementation of every store trait.
///
/// Nothing survives a restart. Suitable for tests and for running the
/// core without a relational backend.
#[derive(Default)]
pub struct MemoryStore {
    pub(crate) users: Mutex<UserTable>,
    pub(crate) edges: Mutex<EdgeTable>,
    pub(crate) posts: Mutex<PostTable>,
    pub(crate) groups: Mutex<GroupTable>,
    pub(crate) conversations: Mutex<ConversationTable>,
    pub(crate) notifications: Mutex<NotificationTable>,
    pub(crate) reports: Mutex<ReportTable>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Locks a table, mapping poisoning to a storage error.
pub(crate) fn lock<'a, T>(table: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>> {
    table.lock().map_err(|_| {
        tracing::error!(table = name, "table lock poisoned");
        SocialnetError::StorageError {
            reason: format!("{name} table lock poisoned"),
        }
    })
}
