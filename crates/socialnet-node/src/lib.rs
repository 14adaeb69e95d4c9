//! Socialnet node runtime.
//!
//! Admission control, the friendship and membership rules, feed
//! assembly, and the notification pipeline with its retention sweep,
//! tied together by [`service::SocialService`] and owned by
//! [`node::Node`].

pub mod admission;
pub mod feed;
pub mod graph;
pub mod membership;
pub mod node;
pub mod pipeline;
pub mod retention;
pub mod service;
pub mod validation;

pub use admission::{AdmissionConfig, AdmissionController, Decision};
pub use feed::{Feed, FeedAssembler};
pub use graph::SocialGraph;
pub use membership::Membership;
pub use node::{Node, NodeState};
pub use pipeline::{pipeline, Dispatcher, NotificationWorker, PipelineConfig, PipelineStats};
pub use retention::{RetentionConfig, RetentionSweep};
pub use service::{RequestContext, SocialService};
