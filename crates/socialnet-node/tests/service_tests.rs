//! End-to-end tests for the action handlers, run through a started
//! [`Node`] so notifications travel the real pipeline.

use std::sync::Arc;

use socialnet_node::node::Node;
use socialnet_node::service::{RequestContext, SocialService};
use socialnet_storage::{MemoryStore, NotificationStore};
use socialnet_types::config::AppConfig;
use socialnet_types::{
    Caller, NotificationKind, ReportStatus, ReportTarget, Result, SocialnetError, UserId,
    UserProfile,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    node: Node<MemoryStore>,
    store: Arc<MemoryStore>,
    service: Arc<SocialService<MemoryStore>>,
}

impl Harness {
    fn start(config: AppConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let mut node = Node::new(&config, Arc::clone(&store))?;
        node.start()?;
        let service = node.service();
        Ok(Self {
            node,
            store,
            service,
        })
    }

    fn user(&self, name: &str) -> Result<RequestContext> {
        let user = self.service.register_user(name, false)?;
        Ok(RequestContext::new(name, Caller::user(user.id)))
    }

    fn admin(&self, name: &str) -> Result<RequestContext> {
        let user = self.service.register_user(name, true)?;
        Ok(RequestContext::new(
            name,
            Caller {
                user_id: user.id,
                is_admin: true,
            },
        ))
    }

    async fn befriend(&self, a: &RequestContext, b: &RequestContext) -> Result<()> {
        let edge = self.service.send_friend_request(a, b.caller.user_id).await?;
        self.service.accept_friend_request(b, edge.id)?;
        Ok(())
    }

    /// Drains the pipeline so every enqueued notification is persisted.
    async fn drain(&mut self) -> Result<()> {
        self.node.shutdown().await.map(|_| ())
    }

    fn kinds_for(&self, user: UserId) -> Result<Vec<NotificationKind>> {
        Ok(self
            .store
            .notifications_for(user, 100)?
            .into_iter()
            .map(|n| n.kind)
            .collect())
    }
}

// ===========================================================================
// Notifications per action
// ===========================================================================

#[tokio::test]
async fn each_action_notifies_its_target_once() -> Result<()> {
    let mut h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let bob = h.user("bob")?;

    h.befriend(&alice, &bob).await?;
    let post = h.service.create_post(&bob, "hello world")?;
    h.service.like_post(&alice, post.id).await?;
    h.service.comment_on_post(&alice, post.id, "nice post").await?;
    let convo = h.service.start_conversation(&alice, bob.caller.user_id)?;
    h.service.send_message(&alice, convo, "hi bob").await?;

    h.drain().await?;

    let mut bob_kinds = h.kinds_for(bob.caller.user_id)?;
    bob_kinds.sort_by_key(|k| k.to_string());
    assert_eq!(
        bob_kinds,
        vec![
            NotificationKind::Comment,
            NotificationKind::FriendRequest,
            NotificationKind::Like,
            NotificationKind::Message,
        ]
    );
    assert!(h.kinds_for(alice.caller.user_id)?.is_empty());
    assert_eq!(h.service.dropped_notifications(), 0);
    Ok(())
}

#[tokio::test]
async fn self_likes_and_comments_do_not_notify() -> Result<()> {
    let mut h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;

    let post = h.service.create_post(&alice, "talking to myself")?;
    h.service.like_post(&alice, post.id).await?;
    h.service.comment_on_post(&alice, post.id, "indeed").await?;

    h.drain().await?;
    assert!(h.kinds_for(alice.caller.user_id)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn enqueue_after_shutdown_is_dropped_not_failed() -> Result<()> {
    let mut h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let bob = h.user("bob")?;
    h.drain().await?;

    let edge = h.service.send_friend_request(&alice, bob.caller.user_id).await?;
    assert!(edge.involves(alice.caller.user_id, bob.caller.user_id));
    assert_eq!(h.service.dropped_notifications(), 1);
    Ok(())
}

// ===========================================================================
// Rules
// ===========================================================================

#[tokio::test]
async fn duplicate_like_rejected() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let post = h.service.create_post(&alice, "post")?;

    h.service.like_post(&alice, post.id).await?;
    assert!(matches!(
        h.service.like_post(&alice, post.id).await,
        Err(SocialnetError::AlreadyLiked)
    ));

    h.service.unlike_post(&alice, post.id)?;
    h.service.like_post(&alice, post.id).await?;
    Ok(())
}

#[tokio::test]
async fn only_author_or_admin_deletes() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let mallory = h.user("mallory")?;
    let admin_user = h.service.register_user("moderator", true)?;
    let admin = RequestContext::new(
        "moderator",
        Caller {
            user_id: admin_user.id,
            is_admin: true,
        },
    );

    let first = h.service.create_post(&alice, "first")?;
    let second = h.service.create_post(&alice, "second")?;

    assert!(matches!(
        h.service.delete_post(&mallory, first.id),
        Err(SocialnetError::Unauthorized { .. })
    ));
    assert!(matches!(
        h.service.edit_post(&mallory, first.id, "defaced"),
        Err(SocialnetError::Unauthorized { .. })
    ));
    h.service.delete_post(&alice, first.id)?;
    h.service.delete_post(&admin, second.id)?;
    assert!(matches!(
        h.service.delete_post(&alice, second.id),
        Err(SocialnetError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn messaging_requires_friendship() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let bob = h.user("bob")?;
    let carol = h.user("carol")?;

    assert!(matches!(
        h.service.start_conversation(&alice, bob.caller.user_id),
        Err(SocialnetError::Unauthorized { .. })
    ));
    assert!(matches!(
        h.service.start_conversation(&alice, alice.caller.user_id),
        Err(SocialnetError::SelfReference)
    ));

    h.befriend(&alice, &bob).await?;
    let convo = h.service.start_conversation(&alice, bob.caller.user_id)?;
    assert_eq!(h.service.start_conversation(&bob, alice.caller.user_id)?, convo);

    h.service.send_message(&bob, convo, "hey").await?;
    assert!(matches!(
        h.service.send_message(&carol, convo, "let me in").await,
        Err(SocialnetError::Unauthorized { .. })
    ));
    assert!(matches!(
        h.service.messages(&carol, convo),
        Err(SocialnetError::Unauthorized { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn group_posts_are_members_only() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let owner = h.user("owner")?;
    let member = h.user("member")?;

    let group = h.service.create_group(&owner, "  Rustaceans  ", "")?;
    assert_eq!(group.title, "Rustaceans");

    assert!(matches!(
        h.service.post_to_group(&member, group.id, "hello"),
        Err(SocialnetError::NotMember)
    ));
    h.service.join_group(&member, group.id)?;
    h.service.post_to_group(&member, group.id, "hello")?;
    assert_eq!(h.service.group_posts(&owner, group.id)?.len(), 1);

    assert!(matches!(
        h.service.leave_group(&owner, group.id),
        Err(SocialnetError::OwnerCannotLeave)
    ));
    h.service.leave_group(&member, group.id)?;
    assert!(matches!(
        h.service.group_posts(&member, group.id),
        Err(SocialnetError::NotMember)
    ));
    Ok(())
}

#[tokio::test]
async fn notifications_are_private_to_recipient() -> Result<()> {
    let mut h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let bob = h.user("bob")?;
    h.service.send_friend_request(&alice, bob.caller.user_id).await?;
    h.drain().await?;

    let inbox = h.service.notifications(&bob)?;
    assert_eq!(inbox.len(), 1);
    assert_eq!(h.service.unread_count(&bob)?, 1);

    assert!(matches!(
        h.service.mark_notification_read(&alice, inbox[0].id),
        Err(SocialnetError::Unauthorized { .. })
    ));
    h.service.mark_notification_read(&bob, inbox[0].id)?;
    assert_eq!(h.service.unread_count(&bob)?, 0);

    assert_eq!(h.service.clear_notifications(&bob)?, 1);
    assert!(h.service.notifications(&bob)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_content_rejected() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;

    assert!(matches!(
        h.service.create_post(&alice, "   "),
        Err(SocialnetError::InvalidContent { .. })
    ));
    assert!(matches!(
        h.service.create_post(&alice, &"x".repeat(5001)),
        Err(SocialnetError::InvalidContent { .. })
    ));
    assert!(matches!(
        h.service.register_user("no spaces allowed", false),
        Err(SocialnetError::InvalidContent { .. })
    ));
    Ok(())
}

// ===========================================================================
// Profiles and single posts
// ===========================================================================

#[tokio::test]
async fn profile_update_is_searchable() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let bob = h.user("bob")?;

    let updated = h.service.update_profile(
        &alice,
        &UserProfile {
            full_name: "  Alice Liddell ".into(),
            bio: "down the rabbit hole".into(),
            avatar_url: String::new(),
        },
    )?;
    assert_eq!(updated.full_name, "Alice Liddell");
    assert_eq!(
        h.service.profile(&bob, alice.caller.user_id)?.bio,
        "down the rabbit hole"
    );

    let found = h.service.search_users(&bob, "LIDDELL")?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, alice.caller.user_id);
    assert!(h.service.search_users(&bob, "nobody")?.is_empty());
    assert!(matches!(
        h.service.search_users(&bob, "   "),
        Err(SocialnetError::InvalidContent { .. })
    ));

    let long_name = "x".repeat(101);
    assert!(matches!(
        h.service.update_profile(
            &alice,
            &UserProfile {
                full_name: long_name,
                ..UserProfile::default()
            }
        ),
        Err(SocialnetError::InvalidContent { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn single_post_carries_like_state() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let bob = h.user("bob")?;
    let carol = h.user("carol")?;

    let post = h.service.create_post(&alice, "hello")?;
    h.service.like_post(&bob, post.id).await?;

    let seen_by_bob = h.service.get_post(&bob, post.id)?;
    assert_eq!(seen_by_bob.like_count, 1);
    assert!(seen_by_bob.liked_by_viewer);
    assert_eq!(seen_by_bob.content, "hello");

    let seen_by_carol = h.service.get_post(&carol, post.id)?;
    assert_eq!(seen_by_carol.like_count, 1);
    assert!(!seen_by_carol.liked_by_viewer);

    h.service.delete_post(&alice, post.id)?;
    assert!(matches!(
        h.service.get_post(&bob, post.id),
        Err(SocialnetError::NotFound { .. })
    ));
    Ok(())
}

// ===========================================================================
// Moderation
// ===========================================================================

#[tokio::test]
async fn moderation_is_admin_only() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let mallory = h.user("mallory")?;

    let post = h.service.create_post(&mallory, "spam spam spam")?;
    let report = h
        .service
        .report(&alice, ReportTarget::Post, post.id.get(), "spam")?;
    assert_eq!(report.status, ReportStatus::Pending);

    assert!(matches!(
        h.service.reports(&alice, ReportStatus::Pending),
        Err(SocialnetError::Unauthorized { .. })
    ));
    assert!(matches!(
        h.service.review_report(&alice, report.id, ReportStatus::Resolved),
        Err(SocialnetError::Unauthorized { .. })
    ));
    assert!(matches!(
        h.service
            .delete_reported_content(&alice, ReportTarget::Post, post.id.get()),
        Err(SocialnetError::Unauthorized { .. })
    ));
    // Still there.
    h.service.get_post(&alice, post.id)?;
    Ok(())
}

#[tokio::test]
async fn admin_reviews_and_removes_reported_content() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let mallory = h.user("mallory")?;
    let admin = h.admin("moderator")?;

    let post = h.service.create_post(&alice, "a fine post")?;
    let comment = h
        .service
        .comment_on_post(&mallory, post.id, "rude remark")
        .await?;
    let first = h
        .service
        .report(&alice, ReportTarget::Comment, comment.id.get(), "abusive")?;
    let second = h.service.report(
        &alice,
        ReportTarget::User,
        mallory.caller.user_id.get(),
        "keeps doing it",
    )?;

    let pending = h.service.reports(&admin, ReportStatus::Pending)?;
    assert_eq!(
        pending.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );

    assert!(matches!(
        h.service.review_report(&admin, first.id, ReportStatus::Pending),
        Err(SocialnetError::InvalidContent { .. })
    ));
    let resolved = h
        .service
        .review_report(&admin, first.id, ReportStatus::Resolved)?;
    assert_eq!(resolved.status, ReportStatus::Resolved);
    assert_eq!(h.service.reports(&admin, ReportStatus::Pending)?.len(), 1);
    assert_eq!(h.service.reports(&admin, ReportStatus::Resolved)?.len(), 1);

    h.service
        .delete_reported_content(&admin, ReportTarget::Comment, comment.id.get())?;
    assert!(h.service.comments(&alice, post.id)?.is_empty());
    assert!(matches!(
        h.service
            .delete_reported_content(&admin, ReportTarget::Comment, comment.id.get()),
        Err(SocialnetError::NotFound { .. })
    ));
    assert!(matches!(
        h.service.delete_reported_content(
            &admin,
            ReportTarget::User,
            mallory.caller.user_id.get()
        ),
        Err(SocialnetError::InvalidContent { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn reports_need_an_existing_target_and_a_reason() -> Result<()> {
    let h = Harness::start(AppConfig::default())?;
    let alice = h.user("alice")?;
    let post = h.service.create_post(&alice, "hello")?;

    assert!(matches!(
        h.service.report(&alice, ReportTarget::Post, 9999, "spam"),
        Err(SocialnetError::NotFound { .. })
    ));
    assert!(matches!(
        h.service.report(&alice, ReportTarget::Post, post.id.get(), "  "),
        Err(SocialnetError::InvalidContent { .. })
    ));
    Ok(())
}

// ===========================================================================
// Admission
// ===========================================================================

#[tokio::test]
async fn actions_are_rate_limited_per_client() -> Result<()> {
    let config = AppConfig {
        rate_limit_count: 3,
        ..AppConfig::default()
    };
    let h = Harness::start(config)?;
    let alice = h.user("alice")?;

    for n in 0..3 {
        h.service.create_post(&alice, &format!("post {n}"))?;
    }
    let limited = h.service.create_post(&alice, "one too many");
    assert!(matches!(limited, Err(SocialnetError::RateLimited { .. })));
    assert_eq!(limited.err().map(|e| e.status_code()), Some(429));

    // Same user from another origin has its own budget.
    let elsewhere = RequestContext::new("198.51.100.4", alice.caller);
    h.service.create_post(&elsewhere, "from my phone")?;
    Ok(())
}
