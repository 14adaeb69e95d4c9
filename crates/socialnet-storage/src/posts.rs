//! Posts, likes and comments.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use socialnet_types::{
    Comment, CommentId, Post, PostId, Result, SocialnetError, Timestamp, UserId,
};

use crate::engine::{allocate, lock, MemoryStore};

/// Post, like and comment storage.
pub trait PostStore: Send + Sync {
    /// Stores a new post.
    fn create_post(&self, author: UserId, content: &str, now: Timestamp) -> Result<Post>;

    /// Returns the post, if it exists.
    fn get_post(&self, id: PostId) -> Result<Option<Post>>;

    /// Replaces the post's content and bumps `updated_at`. Returns the
    /// updated post, or `None` if it does not exist.
    fn update_post(&self, id: PostId, content: &str, now: Timestamp) -> Result<Option<Post>>;

    /// Deletes the post with its likes and comments. Returns `false` if
    /// it did not exist.
    fn delete_post(&self, id: PostId) -> Result<bool>;

    /// Posts by any of `authors`, newest first (`created_at` desc, then
    /// id desc), at most `limit`.
    fn posts_by_authors(&self, authors: &BTreeSet<UserId>, limit: usize) -> Result<Vec<Post>>;

    /// Records a like. Returns `false` if `user` had already liked it.
    fn add_like(&self, post: PostId, user: UserId) -> Result<bool>;

    /// Removes a like. Returns `false` if there was none.
    fn remove_like(&self, post: PostId, user: UserId) -> Result<bool>;

    /// Number of likes on the post.
    fn like_count(&self, post: PostId) -> Result<u64>;

    /// Whether `user` currently likes the post.
    fn has_liked(&self, post: PostId, user: UserId) -> Result<bool>;

    /// Stores a comment on an existing post.
    fn create_comment(
        &self,
        post: PostId,
        author: UserId,
        content: &str,
        now: Timestamp,
    ) -> Result<Comment>;

    /// Comments on the post, oldest first.
    fn comments_for(&self, post: PostId) -> Result<Vec<Comment>>;

    /// Returns the comment, if it exists.
    fn get_comment(&self, id: CommentId) -> Result<Option<Comment>>;

    /// Deletes a comment. Returns `false` if it did not exist.
    fn delete_comment(&self, id: CommentId) -> Result<bool>;
}

impl PostStore for MemoryStore {
    fn create_post(&self, author: UserId, content: &str, now: Timestamp) -> Result<Post> {
        let mut table = lock(&self.posts, "posts")?;
        let id = PostId::new(allocate(&mut table.next_id));
        let post = Post {
            id,
            author,
            content: content.to_owned(),
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, post.clone());
        Ok(post)
    }

    fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        Ok(lock(&self.posts, "posts")?.rows.get(&id).cloned())
    }

    fn update_post(&self, id: PostId, content: &str, now: Timestamp) -> Result<Option<Post>> {
        let mut table = lock(&self.posts, "posts")?;
        Ok(table.rows.get_mut(&id).map(|post| {
            post.content = content.to_owned();
            post.updated_at = now;
            post.clone()
        }))
    }

    fn delete_post(&self, id: PostId) -> Result<bool> {
        let mut table = lock(&self.posts, "posts")?;
        if table.rows.remove(&id).is_none() {
            return Ok(false);
        }
        table.likes.remove(&id);
        table.comments.retain(|_, c| c.post_id != id);
        Ok(true)
    }

    fn posts_by_authors(&self, authors: &BTreeSet<UserId>, limit: usize) -> Result<Vec<Post>> {
        if limit == 0 || authors.is_empty() {
            return Ok(Vec::new());
        }

        let table = lock(&self.posts, "posts")?;
        let mut posts: Vec<Post> = table
            .rows
            .values()
            .filter(|p| authors.contains(&p.author))
            .cloned()
            .collect();
        drop(table);

        posts.sort_by_key(|p| Reverse((p.created_at, p.id)));
        posts.truncate(limit);
        Ok(posts)
    }

    fn add_like(&self, post: PostId, user: UserId) -> Result<bool> {
        let mut table = lock(&self.posts, "posts")?;
        if !table.rows.contains_key(&post) {
            return Err(SocialnetError::not_found(format!("post {post}")));
        }
        Ok(table.likes.entry(post).or_default().insert(user))
    }

    fn remove_like(&self, post: PostId, user: UserId) -> Result<bool> {
        let mut table = lock(&self.posts, "posts")?;
        Ok(table
            .likes
            .get_mut(&post)
            .map(|likers| likers.remove(&user))
            .unwrap_or(false))
    }

    fn like_count(&self, post: PostId) -> Result<u64> {
        let table = lock(&self.posts, "posts")?;
        Ok(table.likes.get(&post).map_or(0, |likers| likers.len() as u64))
    }

    fn has_liked(&self, post: PostId, user: UserId) -> Result<bool> {
        let table = lock(&self.posts, "posts")?;
        Ok(table
            .likes
            .get(&post)
            .is_some_and(|likers| likers.contains(&user)))
    }

    fn create_comment(
        &self,
        post: PostId,
        author: UserId,
        content: &str,
        now: Timestamp,
    ) -> Result<Comment> {
        let mut table = lock(&self.posts, "posts")?;
        if !table.rows.contains_key(&post) {
            return Err(SocialnetError::not_found(format!("post {post}")));
        }
        let id = CommentId::new(allocate(&mut table.next_comment_id));
        let comment = Comment {
            id,
            post_id: post,
            author,
            content: content.to_owned(),
            created_at: now,
        };
        table.comments.insert(id, comment.clone());
        Ok(comment)
    }

    fn comments_for(&self, post: PostId) -> Result<Vec<Comment>> {
        let table = lock(&self.posts, "posts")?;
        Ok(table
            .comments
            .values()
            .filter(|c| c.post_id == post)
            .cloned()
            .collect())
    }

    fn get_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        Ok(lock(&self.posts, "posts")?.comments.get(&id).cloned())
    }

    fn delete_comment(&self, id: CommentId) -> Result<bool> {
        Ok(lock(&self.posts, "posts")?.comments.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn posts_by_authors_orders_and_limits() -> Result<()> {
        let store = MemoryStore::new();
        let base = Timestamp::now();
        let later = base.checked_add(Duration::from_secs(1)).unwrap_or(base);
        let (a, b, c) = (UserId::new(1), UserId::new(2), UserId::new(3));

        let p1 = store.create_post(a, "first", base)?;
        let p2 = store.create_post(b, "second", base)?;
        let p3 = store.create_post(a, "third", later)?;
        store.create_post(c, "hidden", later)?;

        let authors = BTreeSet::from([a, b]);
        let ids: Vec<PostId> = store
            .posts_by_authors(&authors, 10)?
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![p3.id, p2.id, p1.id]);

        assert_eq!(store.posts_by_authors(&authors, 1)?.len(), 1);
        assert!(store.posts_by_authors(&authors, 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn likes_have_set_semantics() -> Result<()> {
        let store = MemoryStore::new();
        let post = store.create_post(UserId::new(1), "hi", Timestamp::now())?;
        let fan = UserId::new(2);

        assert!(store.add_like(post.id, fan)?);
        assert!(!store.add_like(post.id, fan)?);
        assert_eq!(store.like_count(post.id)?, 1);
        assert!(store.has_liked(post.id, fan)?);

        assert!(store.remove_like(post.id, fan)?);
        assert!(!store.remove_like(post.id, fan)?);
        assert_eq!(store.like_count(post.id)?, 0);
        Ok(())
    }

    #[test]
    fn like_on_missing_post_is_not_found() {
        let store = MemoryStore::new();
        let result = store.add_like(PostId::new(5), UserId::new(1));
        assert!(matches!(result, Err(SocialnetError::NotFound { .. })));
    }

    #[test]
    fn update_replaces_content() -> Result<()> {
        let store = MemoryStore::new();
        let created = Timestamp::now();
        let post = store.create_post(UserId::new(1), "draft", created)?;
        let edited = created.checked_add(Duration::from_secs(30)).unwrap_or(created);

        let updated = store.update_post(post.id, "final", edited)?;
        assert!(updated.is_some_and(|p| p.content == "final" && p.updated_at == edited));
        assert!(store.update_post(PostId::new(77), "x", edited)?.is_none());
        Ok(())
    }

    #[test]
    fn single_comment_lookup_and_delete() -> Result<()> {
        let store = MemoryStore::new();
        let post = store.create_post(UserId::new(1), "hi", Timestamp::now())?;
        let keep = store.create_comment(post.id, UserId::new(2), "nice", Timestamp::now())?;
        let spam = store.create_comment(post.id, UserId::new(3), "buy now", Timestamp::now())?;

        assert_eq!(store.get_comment(spam.id)?.map(|c| c.author), Some(UserId::new(3)));
        assert!(store.delete_comment(spam.id)?);
        assert!(!store.delete_comment(spam.id)?);
        assert!(store.get_comment(spam.id)?.is_none());

        let left: Vec<CommentId> = store.comments_for(post.id)?.into_iter().map(|c| c.id).collect();
        assert_eq!(left, vec![keep.id]);
        Ok(())
    }

    #[test]
    fn delete_removes_comments() -> Result<()> {
        let store = MemoryStore::new();
        let post = store.create_post(UserId::new(1), "hi", Timestamp::now())?;
        store.create_comment(post.id, UserId::new(2), "nice", Timestamp::now())?;
        assert_eq!(store.comments_for(post.id)?.len(), 1);

        assert!(store.delete_post(post.id)?);
        assert!(!store.delete_post(post.id)?);
        assert!(store.comments_for(post.id)?.is_empty());
        assert!(store.get_post(post.id)?.is_none());
        Ok(())
    }
}
