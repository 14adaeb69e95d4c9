//! Action handlers.
//!
//! Every action follows the same path: admission check for the caller's
//! [`ClientKey`], validation and graph rules, persistence, then at most
//! one notification per recipient handed to the pipeline. The action
//! never waits for the notification to be persisted, and a notification
//! that cannot be enqueued is logged and counted but does not fail the
//! action that produced it.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use socialnet_storage::SocialStore;
use socialnet_types::{
    Caller, ClientKey, Comment, CommentId, ConversationId, DirectMessage, EdgeId, FeedEntry,
    FriendDecision, FriendEdge, Group, GroupId, GroupPost, Notification, NotificationId,
    NotificationKind, NotificationTask, Post, PostId, Report, ReportId, ReportStatus,
    ReportTarget, Result, SocialnetError, Timestamp, User, UserId, UserProfile,
};

use crate::admission::AdmissionController;
use crate::feed::{Feed, FeedAssembler};
use crate::graph::SocialGraph;
use crate::membership::Membership;
use crate::pipeline::Dispatcher;
use crate::validation;

/// Notifications returned by [`SocialService::notifications`].
pub const NOTIFICATION_PAGE: usize = 50;
/// Messages returned by [`SocialService::messages`].
pub const MESSAGE_PAGE: usize = 100;
/// Posts returned by [`SocialService::group_posts`].
pub const GROUP_POST_PAGE: usize = 50;
/// Default feed length.
pub const FEED_PAGE: usize = 50;
/// Users returned by [`SocialService::search_users`].
pub const SEARCH_PAGE: usize = 20;
/// Reports returned by [`SocialService::reports`].
pub const REPORT_PAGE: usize = 100;

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// Who is acting and where the request came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    /// Rate-limit subject.
    pub client: ClientKey,
    /// Authenticated caller.
    pub caller: Caller,
}

impl RequestContext {
    /// Builds a context from any origin convertible to a [`ClientKey`].
    pub fn new(client: impl Into<ClientKey>, caller: Caller) -> Self {
        Self {
            client: client.into(),
            caller,
        }
    }

    fn user(&self) -> UserId {
        self.caller.user_id
    }
}

// ---------------------------------------------------------------------------
// SocialService
// ---------------------------------------------------------------------------

/// The action surface of the core.
pub struct SocialService<S> {
    store: Arc<S>,
    admission: Arc<AdmissionController>,
    graph: SocialGraph<S>,
    groups: Membership<S>,
    feed: FeedAssembler<S>,
    dispatcher: Dispatcher,
    dropped: AtomicU64,
}

impl<S: SocialStore> SocialService<S> {
    /// Wires the service to its collaborators.
    pub fn new(store: Arc<S>, admission: Arc<AdmissionController>, dispatcher: Dispatcher) -> Self {
        Self {
            graph: SocialGraph::new(Arc::clone(&store)),
            groups: Membership::new(Arc::clone(&store)),
            feed: FeedAssembler::new(Arc::clone(&store)),
            store,
            admission,
            dispatcher,
            dropped: AtomicU64::new(0),
        }
    }

    /// The friendship state machine.
    pub fn graph(&self) -> &SocialGraph<S> {
        &self.graph
    }

    /// Notifications that could not be enqueued.
    pub fn dropped_notifications(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Registers a user. Called by the identity collaborator, so no
    /// admission check applies.
    pub fn register_user(&self, username: &str, is_admin: bool) -> Result<User> {
        let username = validation::username(username)?;
        let user = self.store.create_user(username, is_admin, Timestamp::now())?;
        tracing::info!(user = %user.id, "user registered");
        Ok(user)
    }

    /// A user's public record.
    pub fn profile(&self, ctx: &RequestContext, user: UserId) -> Result<User> {
        self.admit(ctx)?;
        self.store
            .get_user(user)?
            .ok_or_else(|| SocialnetError::not_found(format!("user {user}")))
    }

    /// Replaces the caller's profile fields. Blank fields are stored
    /// empty.
    pub fn update_profile(&self, ctx: &RequestContext, profile: &UserProfile) -> Result<User> {
        self.admit(ctx)?;
        let profile = UserProfile {
            full_name: validation::optional_content(
                "full name",
                &profile.full_name,
                validation::MAX_FULL_NAME_LEN,
            )?
            .to_owned(),
            bio: validation::optional_content("bio", &profile.bio, validation::MAX_BIO_LEN)?
                .to_owned(),
            avatar_url: validation::optional_content(
                "avatar url",
                &profile.avatar_url,
                validation::MAX_AVATAR_URL_LEN,
            )?
            .to_owned(),
        };
        let user = self
            .store
            .update_profile(ctx.user(), &profile)?
            .ok_or_else(|| SocialnetError::not_found(format!("user {}", ctx.user())))?;
        tracing::debug!(user = %user.id, "profile updated");
        Ok(user)
    }

    /// Users whose username or full name contains `term`, ignoring case.
    pub fn search_users(&self, ctx: &RequestContext, term: &str) -> Result<Vec<User>> {
        self.admit(ctx)?;
        let term = validation::content("search term", term, validation::MAX_SEARCH_TERM_LEN)?;
        self.store.search_users(term, SEARCH_PAGE)
    }

    // -----------------------------------------------------------------------
    // Friendship
    // -----------------------------------------------------------------------

    /// Sends a friend request and notifies the addressee.
    pub async fn send_friend_request(
        &self,
        ctx: &RequestContext,
        addressee: UserId,
    ) -> Result<FriendEdge> {
        self.admit(ctx)?;
        let edge = self.graph.request_friendship(ctx.user(), addressee)?;

        let message = format!("{} sent you a friend request", self.display_name(ctx.user()));
        self.notify(addressee, NotificationKind::FriendRequest, edge.id.get(), message)
            .await;
        Ok(edge)
    }

    /// Accepts or blocks a pending request addressed to the caller.
    pub fn respond_to_request(
        &self,
        ctx: &RequestContext,
        edge: EdgeId,
        decision: FriendDecision,
    ) -> Result<FriendEdge> {
        self.admit(ctx)?;
        self.graph.respond_to_request(edge, ctx.user(), decision)
    }

    /// Accepts a pending request addressed to the caller.
    pub fn accept_friend_request(&self, ctx: &RequestContext, edge: EdgeId) -> Result<FriendEdge> {
        self.respond_to_request(ctx, edge, FriendDecision::Accept)
    }

    /// Blocks the requester of a pending request addressed to the caller.
    pub fn block_friend_request(&self, ctx: &RequestContext, edge: EdgeId) -> Result<FriendEdge> {
        self.respond_to_request(ctx, edge, FriendDecision::Block)
    }

    /// The caller's friends.
    pub fn friends(&self, ctx: &RequestContext) -> Result<BTreeSet<UserId>> {
        self.admit(ctx)?;
        self.graph.friends_of(ctx.user())
    }

    /// Requests awaiting the caller's response.
    pub fn pending_requests(&self, ctx: &RequestContext) -> Result<Vec<FriendEdge>> {
        self.admit(ctx)?;
        self.graph.pending_requests(ctx.user())
    }

    // -----------------------------------------------------------------------
    // Posts
    // -----------------------------------------------------------------------

    /// Publishes a post on the caller's wall.
    pub fn create_post(&self, ctx: &RequestContext, content: &str) -> Result<Post> {
        self.admit(ctx)?;
        let content = validation::content("post", content, validation::MAX_POST_LEN)?;
        let post = self.store.create_post(ctx.user(), content, Timestamp::now())?;
        tracing::debug!(post = %post.id, author = %post.author, "post created");
        Ok(post)
    }

    /// Replaces the content of one of the caller's posts.
    pub fn edit_post(&self, ctx: &RequestContext, post: PostId, content: &str) -> Result<Post> {
        self.admit(ctx)?;
        let content = validation::content("post", content, validation::MAX_POST_LEN)?;
        let existing = self.require_post(post)?;
        if existing.author != ctx.user() {
            return Err(SocialnetError::unauthorized("only the author can edit a post"));
        }
        self.store
            .update_post(post, content, Timestamp::now())?
            .ok_or_else(|| SocialnetError::not_found(format!("post {post}")))
    }

    /// Deletes a post. Allowed for its author and for admins.
    pub fn delete_post(&self, ctx: &RequestContext, post: PostId) -> Result<()> {
        self.admit(ctx)?;
        let existing = self.require_post(post)?;
        if existing.author != ctx.user() && !ctx.caller.is_admin {
            return Err(SocialnetError::unauthorized(
                "only the author or an admin can delete a post",
            ));
        }
        if !self.store.delete_post(post)? {
            return Err(SocialnetError::not_found(format!("post {post}")));
        }
        tracing::info!(post = %post, by = %ctx.user(), "post deleted");
        Ok(())
    }

    /// Likes a post and notifies its author, unless the caller is the
    /// author.
    pub async fn like_post(&self, ctx: &RequestContext, post: PostId) -> Result<()> {
        self.admit(ctx)?;
        let existing = self.require_post(post)?;
        if !self.store.add_like(post, ctx.user())? {
            return Err(SocialnetError::AlreadyLiked);
        }

        if existing.author != ctx.user() {
            let message = format!("{} liked your post", self.display_name(ctx.user()));
            self.notify(existing.author, NotificationKind::Like, post.get(), message)
                .await;
        }
        Ok(())
    }

    /// Removes the caller's like. Unliking a post that was not liked is
    /// a no-op.
    pub fn unlike_post(&self, ctx: &RequestContext, post: PostId) -> Result<()> {
        self.admit(ctx)?;
        self.store.remove_like(post, ctx.user())?;
        Ok(())
    }

    /// Comments on a post and notifies its author, unless the caller is
    /// the author.
    pub async fn comment_on_post(
        &self,
        ctx: &RequestContext,
        post: PostId,
        content: &str,
    ) -> Result<Comment> {
        self.admit(ctx)?;
        let content = validation::content("comment", content, validation::MAX_COMMENT_LEN)?;
        let existing = self.require_post(post)?;
        let comment = self
            .store
            .create_comment(post, ctx.user(), content, Timestamp::now())?;

        if existing.author != ctx.user() {
            let message = format!("{} commented on your post", self.display_name(ctx.user()));
            self.notify(existing.author, NotificationKind::Comment, post.get(), message)
                .await;
        }
        Ok(comment)
    }

    /// One post with its like count and whether the caller liked it.
    pub fn get_post(&self, ctx: &RequestContext, post: PostId) -> Result<FeedEntry> {
        self.admit(ctx)?;
        let existing = self.require_post(post)?;
        self.feed.project(existing, ctx.user())
    }

    /// Comments on a post, oldest first.
    pub fn comments(&self, ctx: &RequestContext, post: PostId) -> Result<Vec<Comment>> {
        self.admit(ctx)?;
        self.require_post(post)?;
        self.store.comments_for(post)
    }

    /// The caller's feed, at most `limit` entries.
    pub fn feed(&self, ctx: &RequestContext, limit: usize) -> Result<Feed> {
        self.admit(ctx)?;
        self.feed.assemble(ctx.user(), limit)
    }

    // -----------------------------------------------------------------------
    // Messaging
    // -----------------------------------------------------------------------

    /// Opens (or reuses) the direct conversation between the caller and
    /// `other`. Only friends can message each other.
    pub fn start_conversation(&self, ctx: &RequestContext, other: UserId) -> Result<ConversationId> {
        self.admit(ctx)?;
        if other == ctx.user() {
            return Err(SocialnetError::SelfReference);
        }
        if !self.store.user_exists(other)? {
            return Err(SocialnetError::not_found(format!("user {other}")));
        }
        if !self.graph.are_friends(ctx.user(), other)? {
            return Err(SocialnetError::unauthorized("can only message friends"));
        }
        self.store.find_or_create_direct(ctx.user(), other)
    }

    /// Conversations the caller takes part in.
    pub fn conversations(&self, ctx: &RequestContext) -> Result<Vec<ConversationId>> {
        self.admit(ctx)?;
        self.store.conversations_of(ctx.user())
    }

    /// Sends a message and notifies every other member.
    pub async fn send_message(
        &self,
        ctx: &RequestContext,
        conversation: ConversationId,
        body: &str,
    ) -> Result<DirectMessage> {
        self.admit(ctx)?;
        let body = validation::content("message", body, validation::MAX_MESSAGE_LEN)?;
        let members = self.require_conversation_member(conversation, ctx.user())?;
        let message = self
            .store
            .create_message(conversation, ctx.user(), body, Timestamp::now())?;

        let text = format!("{} sent you a message", self.display_name(ctx.user()));
        let recipients: BTreeSet<UserId> =
            members.into_iter().filter(|m| *m != ctx.user()).collect();
        for recipient in recipients {
            self.notify(
                recipient,
                NotificationKind::Message,
                conversation.get(),
                text.clone(),
            )
            .await;
        }
        Ok(message)
    }

    /// The latest messages in a conversation the caller belongs to,
    /// oldest first.
    pub fn messages(
        &self,
        ctx: &RequestContext,
        conversation: ConversationId,
    ) -> Result<Vec<DirectMessage>> {
        self.admit(ctx)?;
        self.require_conversation_member(conversation, ctx.user())?;
        self.store.messages(conversation, MESSAGE_PAGE)
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Creates a group owned by the caller.
    pub fn create_group(
        &self,
        ctx: &RequestContext,
        title: &str,
        description: &str,
    ) -> Result<Group> {
        self.admit(ctx)?;
        let title = validation::content("title", title, validation::MAX_GROUP_TITLE_LEN)?;
        let description = validation::optional_content(
            "description",
            description,
            validation::MAX_GROUP_DESCRIPTION_LEN,
        )?;
        self.groups.create_group(ctx.user(), title, description)
    }

    /// Joins a group.
    pub fn join_group(&self, ctx: &RequestContext, group: GroupId) -> Result<()> {
        self.admit(ctx)?;
        self.groups.join_group(group, ctx.user())
    }

    /// Leaves a group.
    pub fn leave_group(&self, ctx: &RequestContext, group: GroupId) -> Result<()> {
        self.admit(ctx)?;
        self.groups.leave_group(group, ctx.user())
    }

    /// Groups the caller belongs to.
    pub fn my_groups(&self, ctx: &RequestContext) -> Result<Vec<Group>> {
        self.admit(ctx)?;
        self.store.groups_of(ctx.user())
    }

    /// Posts into a group the caller belongs to.
    pub fn post_to_group(
        &self,
        ctx: &RequestContext,
        group: GroupId,
        content: &str,
    ) -> Result<GroupPost> {
        self.admit(ctx)?;
        let content = validation::content("post", content, validation::MAX_POST_LEN)?;
        self.groups.require_member(group, ctx.user())?;
        self.store
            .create_group_post(group, ctx.user(), content, Timestamp::now())
    }

    /// Latest posts of a group the caller belongs to.
    pub fn group_posts(&self, ctx: &RequestContext, group: GroupId) -> Result<Vec<GroupPost>> {
        self.admit(ctx)?;
        self.groups.require_member(group, ctx.user())?;
        self.store.group_posts(group, GROUP_POST_PAGE)
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// The caller's latest notifications, newest first.
    pub fn notifications(&self, ctx: &RequestContext) -> Result<Vec<Notification>> {
        self.admit(ctx)?;
        self.store.notifications_for(ctx.user(), NOTIFICATION_PAGE)
    }

    /// Marks one of the caller's notifications read.
    pub fn mark_notification_read(&self, ctx: &RequestContext, id: NotificationId) -> Result<()> {
        self.admit(ctx)?;
        let notification = self
            .store
            .get_notification(id)?
            .ok_or_else(|| SocialnetError::not_found(format!("notification {id}")))?;
        if notification.recipient != ctx.user() {
            return Err(SocialnetError::unauthorized(
                "notification belongs to another user",
            ));
        }
        self.store.mark_read(id)?;
        Ok(())
    }

    /// The caller's unread notification count.
    pub fn unread_count(&self, ctx: &RequestContext) -> Result<u64> {
        self.admit(ctx)?;
        self.store.unread_count(ctx.user())
    }

    /// Deletes all of the caller's notifications.
    pub fn clear_notifications(&self, ctx: &RequestContext) -> Result<u64> {
        self.admit(ctx)?;
        self.store.clear_notifications(ctx.user())
    }

    // -----------------------------------------------------------------------
    // Moderation
    // -----------------------------------------------------------------------

    /// Files a report against a post, comment or user. The target must
    /// exist.
    pub fn report(
        &self,
        ctx: &RequestContext,
        target: ReportTarget,
        target_id: u64,
        reason: &str,
    ) -> Result<Report> {
        self.admit(ctx)?;
        let reason = validation::content("reason", reason, validation::MAX_REPORT_REASON_LEN)?;
        if !self.target_exists(target, target_id)? {
            return Err(SocialnetError::not_found(format!("{target} {target_id}")));
        }
        let report = self
            .store
            .create_report(ctx.user(), target, target_id, reason, Timestamp::now())?;
        tracing::info!(
            report = %report.id,
            reporter = %report.reporter,
            %target,
            target_id,
            "report filed"
        );
        Ok(report)
    }

    /// Reports in `status`, newest first. Admins only.
    pub fn reports(&self, ctx: &RequestContext, status: ReportStatus) -> Result<Vec<Report>> {
        self.admit(ctx)?;
        self.require_admin(ctx)?;
        self.store.reports_with_status(status, REPORT_PAGE)
    }

    /// Moves a report to `Reviewed` or `Resolved`. Admins only.
    pub fn review_report(
        &self,
        ctx: &RequestContext,
        report: ReportId,
        status: ReportStatus,
    ) -> Result<Report> {
        self.admit(ctx)?;
        self.require_admin(ctx)?;
        if status == ReportStatus::Pending {
            return Err(SocialnetError::InvalidContent {
                reason: "a report can only move to reviewed or resolved".into(),
            });
        }
        let updated = self
            .store
            .update_report_status(report, status)?
            .ok_or_else(|| SocialnetError::not_found(format!("report {report}")))?;
        tracing::info!(report = %report, %status, by = %ctx.user(), "report reviewed");
        Ok(updated)
    }

    /// Removes reported content. Posts and comments can be removed;
    /// users cannot. Admins only.
    pub fn delete_reported_content(
        &self,
        ctx: &RequestContext,
        target: ReportTarget,
        target_id: u64,
    ) -> Result<()> {
        self.admit(ctx)?;
        self.require_admin(ctx)?;
        let removed = match target {
            ReportTarget::Post => self.store.delete_post(PostId::new(target_id))?,
            ReportTarget::Comment => self.store.delete_comment(CommentId::new(target_id))?,
            ReportTarget::User => {
                return Err(SocialnetError::InvalidContent {
                    reason: "reported users cannot be deleted".into(),
                })
            }
        };
        if !removed {
            return Err(SocialnetError::not_found(format!("{target} {target_id}")));
        }
        tracing::info!(%target, target_id, by = %ctx.user(), "reported content removed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn require_admin(&self, ctx: &RequestContext) -> Result<()> {
        if ctx.caller.is_admin {
            Ok(())
        } else {
            Err(SocialnetError::unauthorized("admin role required"))
        }
    }

    fn target_exists(&self, target: ReportTarget, target_id: u64) -> Result<bool> {
        Ok(match target {
            ReportTarget::Post => self.store.get_post(PostId::new(target_id))?.is_some(),
            ReportTarget::Comment => self
                .store
                .get_comment(CommentId::new(target_id))?
                .is_some(),
            ReportTarget::User => self.store.get_user(UserId::new(target_id))?.is_some(),
        })
    }

    fn admit(&self, ctx: &RequestContext) -> Result<()> {
        self.admission.check(&ctx.client)
    }

    fn require_post(&self, post: PostId) -> Result<Post> {
        self.store
            .get_post(post)?
            .ok_or_else(|| SocialnetError::not_found(format!("post {post}")))
    }

    fn require_conversation_member(
        &self,
        conversation: ConversationId,
        user: UserId,
    ) -> Result<Vec<UserId>> {
        let members = self
            .store
            .conversation_members(conversation)?
            .ok_or_else(|| SocialnetError::not_found(format!("conversation {conversation}")))?;
        if !members.contains(&user) {
            return Err(SocialnetError::unauthorized(
                "not a member of this conversation",
            ));
        }
        Ok(members)
    }

    fn display_name(&self, user: UserId) -> String {
        match self.store.get_user(user) {
            Ok(Some(record)) => record.username,
            _ => format!("user {user}"),
        }
    }

    async fn notify(&self, recipient: UserId, kind: NotificationKind, target_id: u64, message: String) {
        let task = NotificationTask {
            recipient,
            kind,
            target_id,
            message,
        };
        if let Err(e) = self.dispatcher.enqueue(task).await {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%e, recipient = %recipient, %kind, "notification dropped");
        }
    }
}
