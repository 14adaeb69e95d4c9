//! Persistence collaborator for the socialnet core.
//!
//! Each concern exposes a trait (`UserStore`, `GraphStore`, `PostStore`,
//! `GroupStore`, `ConversationStore`, `NotificationStore`, `ReportStore`)
//! so the node crate depends on behavior rather than on a schema.
//! [`MemoryStore`] implements all of them with one lock per table and
//! backs the tests and the daemon.
//!
//! Store calls are synchronous and never retried here. Failures surface
//! as [`socialnet_types::SocialnetError::StorageError`] and propagate
//! to the caller unchanged.

pub mod conversations;
pub mod engine;
pub mod graph;
pub mod groups;
pub mod notifications;
pub mod posts;
pub mod reports;
pub mod users;

pub use conversations::ConversationStore;
pub use engine::MemoryStore;
pub use graph::{GraphStore, StatusUpdate};
pub use groups::GroupStore;
pub use notifications::NotificationStore;
pub use posts::PostStore;
pub use reports::ReportStore;
pub use users::UserStore;

/// Every collaborator concern in one bound.
///
/// Implemented automatically for any type implementing all of them.
pub trait SocialStore:
    UserStore
    + GraphStore
    + PostStore
    + GroupStore
    + ConversationStore
    + NotificationStore
    + ReportStore
{
}

impl<T> SocialStore for T where
    T: UserStore
        + GraphStore
        + PostStore
        + GroupStore
        + ConversationStore
        + NotificationStore
        + ReportStore
{
}
