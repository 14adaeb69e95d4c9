//! Core shared types for the socialnet core.
//!
//! This crate defines all fundamental types used across the workspace.
//! No other crate should define shared types; everything lives here.

pub mod config;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Numeric identifiers
// ---------------------------------------------------------------------------

/// Declares a `u64`-backed identifier newtype assigned by the store.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            /// Creates the identifier from its raw value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw value.
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Registered user.
    UserId
);
define_id!(
    /// Feed post.
    PostId
);
define_id!(
    /// Comment on a post.
    CommentId
);
define_id!(
    /// Friendship edge. Edges are never deleted, so ids are stable.
    EdgeId
);
define_id!(
    /// Group.
    GroupId
);
define_id!(
    /// Post inside a group.
    GroupPostId
);
define_id!(
    /// Direct-message conversation.
    ConversationId
);
define_id!(
    /// Direct message.
    MessageId
);
define_id!(
    /// Persisted notification.
    NotificationId
);
define_id!(
    /// Moderation report.
    ReportId
);

// ---------------------------------------------------------------------------
// ClientKey
// ---------------------------------------------------------------------------

/// Subject of rate limiting, typically the caller's network origin.
///
/// Only lives inside the admission controller's in-memory table.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClientKey(String);

impl ClientKey {
    /// Creates a key from any string-like origin.
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientKey {
    fn from(origin: &str) -> Self {
        Self(origin.to_owned())
    }
}

impl From<std::net::SocketAddr> for ClientKey {
    /// Keys by IP only, so reconnecting from a new port shares a window.
    fn from(addr: std::net::SocketAddr) -> Self {
        Self(addr.ip().to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// UTC wall-clock timestamp.
///
/// Used for record creation and update times. Admission windows use the
/// monotonic `std::time::Instant` instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a `Timestamp` from a `DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the timestamp as an ISO 8601 string.
    pub fn as_str(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Returns the timestamp `age` before this one, or `None` if it is
    /// not representable.
    pub fn checked_sub(&self, age: Duration) -> Option<Self> {
        let age = chrono::Duration::from_std(age).ok()?;
        self.0.checked_sub_signed(age).map(Self)
    }

    /// Returns the timestamp `delta` after this one, or `None` if it is
    /// not representable.
    pub fn checked_add(&self, delta: Duration) -> Option<Self> {
        let delta = chrono::Duration::from_std(delta).ok()?;
        self.0.checked_add_signed(delta).map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl FromStr for Timestamp {
    type Err = SocialnetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| SocialnetError::ConfigError {
                reason: format!("invalid ISO 8601 timestamp: {e}"),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }
}

// ---------------------------------------------------------------------------
// Caller
// ---------------------------------------------------------------------------

/// Authenticated identity supplied by the identity collaborator.
///
/// The core consumes this; it never authenticates anyone itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    /// Authenticated user.
    pub user_id: UserId,
    /// Whether the user holds the admin role.
    pub is_admin: bool,
}

impl Caller {
    /// A regular (non-admin) caller.
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Friendship
// ---------------------------------------------------------------------------

/// Lifecycle status of a [`FriendEdge`].
///
/// ```text
/// Pending ──accept──▶ Accepted
///    └─────block───▶ Blocked
/// ```
///
/// `Accepted` and `Blocked` are terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendStatus {
    /// Request sent, awaiting the addressee.
    Pending,
    /// Addressee accepted.
    Accepted,
    /// Addressee blocked the requester.
    Blocked,
}

impl FriendStatus {
    /// Returns `true` if `self → next` is an allowed transition.
    pub fn can_transition_to(self, next: FriendStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted) | (Self::Pending, Self::Blocked)
        )
    }

    /// Returns `true` once the edge has left `Pending`.
    pub fn is_resolved(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for FriendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

/// The addressee's answer to a pending request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendDecision {
    /// Become friends.
    Accept,
    /// Refuse and block the requester.
    Block,
}

impl FriendDecision {
    /// Status the edge moves to on this decision.
    pub fn target_status(self) -> FriendStatus {
        match self {
            Self::Accept => FriendStatus::Accepted,
            Self::Block => FriendStatus::Blocked,
        }
    }
}

/// A directed friendship edge, owned by its requester.
///
/// Lookups are direction-agnostic ([`involves`](Self::involves)) while
/// authorization is direction-sensitive
/// ([`is_addressee`](Self::is_addressee)).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FriendEdge {
    pub id: EdgeId,
    pub requester: UserId,
    pub addressee: UserId,
    pub status: FriendStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FriendEdge {
    /// Returns `true` if the edge connects `a` and `b` in either direction.
    pub fn involves(&self, a: UserId, b: UserId) -> bool {
        (self.requester == a && self.addressee == b)
            || (self.requester == b && self.addressee == a)
    }

    /// Returns `true` if `user` is the side allowed to resolve the edge.
    pub fn is_addressee(&self, user: UserId) -> bool {
        self.addressee == user
    }

    /// The other endpoint, if `user` is one of them.
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        if self.requester == user {
            Some(self.addressee)
        } else if self.addressee == user {
            Some(self.requester)
        } else {
            None
        }
    }

    /// The unordered pair as `(low, high)`.
    pub fn pair(&self) -> (UserId, UserId) {
        normalized_pair(self.requester, self.addressee)
    }
}

/// Orders a user pair so both directions map to the same key.
pub fn normalized_pair(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Effective relationship of a pair, given every edge between them.
///
/// The most recently resolved edge decides, ties broken by the higher
/// edge id, so a later block supersedes an older accept. Pending edges
/// never decide. `None` means the pair has no resolved edge.
pub fn resolved_relationship<'a, I>(edges: I) -> Option<FriendStatus>
where
    I: IntoIterator<Item = &'a FriendEdge>,
{
    edges
        .into_iter()
        .filter(|e| e.status.is_resolved())
        .max_by_key(|e| (e.updated_at, e.id))
        .map(|e| e.status)
}

// ---------------------------------------------------------------------------
// Content records
// ---------------------------------------------------------------------------

/// Registered user as seen by the core.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub bio: String,
    pub avatar_url: String,
    pub is_admin: bool,
    pub created_at: Timestamp,
}

/// Editable part of a user's profile. Empty strings clear a field.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub full_name: String,
    pub bio: String,
    pub avatar_url: String,
}

/// A post on the author's wall.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: UserId,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A comment on a post.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: UserId,
    pub content: String,
    pub created_at: Timestamp,
}

/// A group. The owner is always a member.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub owner: UserId,
    pub title: String,
    pub description: String,
    pub created_at: Timestamp,
}

/// A post visible to group members only.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupPost {
    pub id: GroupPostId,
    pub group_id: GroupId,
    pub author: UserId,
    pub content: String,
    pub created_at: Timestamp,
}

/// A direct message inside a conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: UserId,
    pub body: String,
    pub created_at: Timestamp,
}

/// Read-time projection of a post for one viewer, used by the feed and
/// by single-post reads.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub post_id: PostId,
    pub author: UserId,
    pub created_at: Timestamp,
    pub content: String,
    /// Likes at the moment the feed was assembled.
    pub like_count: u64,
    /// Whether the viewer had liked the post when the feed was assembled.
    pub liked_by_viewer: bool,
}

// ---------------------------------------------------------------------------
// Moderation
// ---------------------------------------------------------------------------

/// Kind of content a report points at.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTarget {
    Post,
    Comment,
    User,
}

impl fmt::Display for ReportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => write!(f, "post"),
            Self::Comment => write!(f, "comment"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Review state of a [`Report`].
///
/// Reports start `Pending`; an admin moves them to `Reviewed` or
/// `Resolved`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Reviewed => write!(f, "reviewed"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// A user's complaint about a post, comment or user.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub reporter: UserId,
    pub target: ReportTarget,
    pub target_id: u64,
    pub reason: String,
    pub status: ReportStatus,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// What triggered a notification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequest,
    Like,
    Comment,
    Message,
    GroupInvite,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FriendRequest => write!(f, "friend_request"),
            Self::Like => write!(f, "like"),
            Self::Comment => write!(f, "comment"),
            Self::Message => write!(f, "message"),
            Self::GroupInvite => write!(f, "group_invite"),
        }
    }
}

/// A notification on its way to persistence.
///
/// Created by an action handler and moved into the pipeline on enqueue.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NotificationTask {
    pub recipient: UserId,
    pub kind: NotificationKind,
    /// Id of the post, edge or conversation the notification points at.
    pub target_id: u64,
    pub message: String,
}

/// A persisted notification.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub target_id: u64,
    pub message: String,
    pub read: bool,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// SocialnetError
// ---------------------------------------------------------------------------

/// Central error type for the socialnet core.
///
/// All crates in the workspace convert their internal errors into variants
/// of this enum, ensuring a unified error handling surface.
#[derive(Debug, Error)]
pub enum SocialnetError {
    /// The client exceeded its admission budget.
    #[error("rate limit exceeded: retry after {retry_after:?}")]
    RateLimited {
        /// Time until the oldest admission in the window expires.
        retry_after: Duration,
    },

    /// A user tried to befriend or message themselves.
    #[error("cannot target yourself")]
    SelfReference,

    /// The pair are already friends.
    #[error("already friends")]
    AlreadyConnected,

    /// An unresolved request already exists between the pair.
    #[error("friend request {edge} is already pending")]
    RequestPending {
        /// The open edge, in whichever direction it was created.
        edge: EdgeId,
    },

    /// The edge has already left `pending`.
    #[error("request already processed")]
    AlreadyResolved,

    /// The caller is not allowed to perform this action.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Human-readable description of the failed predicate.
        reason: String,
    },

    /// A referenced entity does not exist.
    #[error("{what} not found")]
    NotFound {
        /// Kind and id of the missing entity.
        what: String,
    },

    /// The user is already a member of the group.
    #[error("already a member")]
    AlreadyMember,

    /// The user is not a member of the group.
    #[error("not a member")]
    NotMember,

    /// Group owners cannot leave their own group.
    #[error("owner cannot leave group")]
    OwnerCannotLeave,

    /// The post was already liked by this user.
    #[error("already liked")]
    AlreadyLiked,

    /// User-supplied content failed validation.
    #[error("invalid content: {reason}")]
    InvalidContent {
        /// Human-readable description of the validation failure.
        reason: String,
    },

    /// Enqueue waited past its deadline for buffer space.
    #[error("notification queue full after waiting {waited:?}")]
    QueueTimeout {
        /// The deadline that expired.
        waited: Duration,
    },

    /// Non-waiting enqueue found the buffer full.
    #[error("notification queue full")]
    QueueFull,

    /// The pipeline has shut down.
    #[error("notification queue closed")]
    QueueClosed,

    /// A storage collaborator operation failed.
    #[error("storage error: {reason}")]
    StorageError {
        /// Human-readable description of the storage failure.
        reason: String,
    },

    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// A background task or lock failed unexpectedly.
    #[error("internal error: {reason}")]
    Internal {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl SocialnetError {
    /// Shorthand for a [`NotFound`](Self::NotFound) error.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound {
            what: what.to_string(),
        }
    }

    /// Shorthand for an [`Unauthorized`](Self::Unauthorized) error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RateLimited { .. } => 429,
            Self::SelfReference | Self::InvalidContent { .. } => 400,
            Self::Unauthorized { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::AlreadyConnected
            | Self::RequestPending { .. }
            | Self::AlreadyResolved
            | Self::AlreadyMember
            | Self::NotMember
            | Self::OwnerCannotLeave
            | Self::AlreadyLiked => 409,
            Self::QueueTimeout { .. } | Self::QueueFull | Self::QueueClosed => 503,
            Self::StorageError { .. } | Self::ConfigError { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::QueueTimeout { .. }
                | Self::QueueFull
                | Self::StorageError { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Result alias
// ---------------------------------------------------------------------------

/// Convenience result type using [`SocialnetError`].
pub type Result<T> = std::result::Result<T, SocialnetError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
