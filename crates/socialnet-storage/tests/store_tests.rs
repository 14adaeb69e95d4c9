//! Integration tests for the in-memory store: cross-table use through the
//! [`SocialStore`] bound and atomicity under concurrent writers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use socialnet_storage::{
    ConversationStore, GraphStore, GroupStore, MemoryStore, NotificationStore, PostStore,
    SocialStore, StatusUpdate, UserStore,
};
use socialnet_types::{
    FriendStatus, NotificationKind, NotificationTask, Result, SocialnetError, Timestamp, UserId,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn users<S: SocialStore>(store: &S, names: &[&str]) -> Result<Vec<UserId>> {
    names
        .iter()
        .map(|name| Ok(store.create_user(name, false, Timestamp::now())?.id))
        .collect()
}

/// Friends of `user` who authored at least one post, using only the
/// combined bound.
fn friends_with_posts<S: SocialStore>(store: &S, user: UserId) -> Result<BTreeSet<UserId>> {
    let friends = store.accepted_friends_of(user)?;
    Ok(store
        .posts_by_authors(&friends, 100)?
        .into_iter()
        .map(|p| p.author)
        .collect())
}

// ===========================================================================
// Cross-table
// ===========================================================================

#[test]
fn tables_compose_through_combined_bound() -> Result<()> {
    let store = MemoryStore::new();
    let ids = users(&store, &["alice", "bob", "carol"])?;
    let (alice, bob, carol) = (ids[0], ids[1], ids[2]);

    let edge = store.create_friend_edge(alice, bob, Timestamp::now())?;
    store.update_friend_edge_status(
        edge.id,
        FriendStatus::Pending,
        FriendStatus::Accepted,
        Timestamp::now(),
    )?;
    store.create_post(bob, "bob was here", Timestamp::now())?;
    store.create_post(carol, "carol was here", Timestamp::now())?;

    assert_eq!(friends_with_posts(&store, alice)?, BTreeSet::from([bob]));

    let group = store.create_group(alice, "book club", "", Timestamp::now())?;
    assert!(store.add_member(group.id, bob)?);
    assert_eq!(store.member_count(group.id)?, 2);

    let convo = store.find_or_create_direct(alice, bob)?;
    store.create_message(convo, bob, "hi", Timestamp::now())?;
    store.create_notification(
        &NotificationTask {
            recipient: alice,
            kind: NotificationKind::Message,
            target_id: convo.get(),
            message: "bob sent you a message".into(),
        },
        Timestamp::now(),
    )?;
    assert_eq!(store.unread_count(alice)?, 1);
    Ok(())
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[test]
fn racing_requests_for_one_pair_create_one_edge() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let ids = users(store.as_ref(), &["alice", "bob"])?;
    let (alice, bob) = (ids[0], ids[1]);

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let store = Arc::clone(&store);
            let (from, to) = if n % 2 == 0 { (alice, bob) } else { (bob, alice) };
            thread::spawn(move || store.create_friend_edge(from, to, Timestamp::now()))
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.join().expect("thread panicked") {
            Ok(_) => created += 1,
            Err(SocialnetError::RequestPending { .. }) => {}
            Err(other) => return Err(other),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(store.edges_of(alice)?.len(), 1);
    Ok(())
}

#[test]
fn racing_status_updates_apply_once() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let ids = users(store.as_ref(), &["alice", "bob"])?;
    let edge = store.create_friend_edge(ids[0], ids[1], Timestamp::now())?;

    let handles: Vec<_> = [FriendStatus::Accepted, FriendStatus::Blocked]
        .into_iter()
        .cycle()
        .take(8)
        .map(|next| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.update_friend_edge_status(
                    edge.id,
                    FriendStatus::Pending,
                    next,
                    Timestamp::now(),
                )
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        if let StatusUpdate::Updated(edge) = handle.join().expect("thread panicked")? {
            winners.push(edge.status);
        }
    }

    assert_eq!(winners.len(), 1);
    let stored = store.get_friend_edge(edge.id)?.map(|e| e.status);
    assert_eq!(stored, Some(winners[0]));
    Ok(())
}

#[test]
fn concurrent_likes_count_each_user_once() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let names: Vec<String> = (0..10).map(|n| format!("user{n}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let ids = users(store.as_ref(), &name_refs)?;
    let post = store.create_post(ids[0], "popular", Timestamp::now())?;

    let handles: Vec<_> = ids
        .iter()
        .flat_map(|id| [*id, *id])
        .map(|user| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.add_like(post.id, user))
        })
        .collect();

    let mut fresh = 0;
    for handle in handles {
        if handle.join().expect("thread panicked")? {
            fresh += 1;
        }
    }

    assert_eq!(fresh, ids.len());
    assert_eq!(store.like_count(post.id)?, ids.len() as u64);
    Ok(())
}
