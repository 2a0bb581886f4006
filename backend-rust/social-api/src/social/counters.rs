//! Denormalized counters. Each one is overwritten with a fresh COUNT of the
//! edges it summarizes; nothing here increments or decrements.

use rusqlite::{params, params_from_iter};

use crate::models::ContentRef;
use crate::store::{Store, StoreResult};

/// A single cached aggregate and the row that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counter {
    Replies(ContentRef),
    Reposts(ContentRef),
    Likes(ContentRef),
    Bookmarks(ContentRef),
    /// Timeline entries of a user.
    Posts(String),
    Followers(String),
    Following(String),
}

impl Counter {
    fn plan(&self) -> Plan<'_> {
        match self {
            Counter::Replies(target) => content_plan(
                target,
                "reply_count",
                "SELECT COUNT(*) FROM replies WHERE target_type = ?1 AND target_id = ?2",
            ),
            Counter::Reposts(target) => content_plan(
                target,
                "repost_count",
                "SELECT COUNT(*) FROM user_threads WHERE repost_type = ?1 AND repost_id = ?2",
            ),
            Counter::Likes(target) => content_plan(
                target,
                "like_count",
                "SELECT COUNT(*) FROM likes WHERE target_type = ?1 AND target_id = ?2",
            ),
            Counter::Bookmarks(target) => content_plan(
                target,
                "bookmark_count",
                "SELECT COUNT(*) FROM bookmarks WHERE target_type = ?1 AND target_id = ?2",
            ),
            Counter::Posts(user_id) => user_plan(
                user_id,
                "post_count",
                "SELECT COUNT(*) FROM user_threads WHERE user_id = ?1",
            ),
            Counter::Followers(user_id) => user_plan(
                user_id,
                "follower_count",
                "SELECT COUNT(*) FROM follows WHERE followee_id = ?1",
            ),
            Counter::Following(user_id) => user_plan(
                user_id,
                "following_count",
                "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
            ),
        }
    }
}

/// Where a counter is stored and how its true value is counted.
struct Plan<'a> {
    table: &'static str,
    row_id: &'a str,
    column: &'static str,
    count_sql: &'static str,
    args: Vec<&'a str>,
}

fn content_plan<'a>(target: &'a ContentRef, column: &'static str, count_sql: &'static str) -> Plan<'a> {
    Plan {
        table: target.kind.table(),
        row_id: &target.id,
        column,
        count_sql,
        args: vec![target.kind.as_str(), &target.id],
    }
}

fn user_plan<'a>(user_id: &'a str, column: &'static str, count_sql: &'static str) -> Plan<'a> {
    Plan {
        table: "users",
        row_id: user_id,
        column,
        count_sql,
        args: vec![user_id],
    }
}

/// Recomputes one counter from the live edges and stores it. Returns the new
/// value. A missing row is not an error; the count is still returned.
pub fn recount(store: &Store, counter: &Counter) -> StoreResult<i64> {
    let plan = counter.plan();
    let conn = store.lock()?;
    let count: i64 = conn.query_row(plan.count_sql, params_from_iter(plan.args.iter()), |row| row.get(0))?;
    conn.execute(
        &format!("UPDATE {} SET {} = ?1 WHERE id = ?2", plan.table, plan.column),
        params![count, plan.row_id],
    )?;
    log::debug!("Recounted {:?} = {}", counter, count);
    Ok(count)
}

pub fn recount_all(store: &Store, counters: &[Counter]) -> StoreResult<()> {
    for counter in counters {
        recount(store, counter)?;
    }
    Ok(())
}

/// Both sides of a follow edge: the follower's following count and the
/// followee's follower count.
pub fn recount_follow(store: &Store, follower_id: &str, followee_id: &str) -> StoreResult<()> {
    recount_all(
        store,
        &[
            Counter::Following(follower_id.to_string()),
            Counter::Followers(followee_id.to_string()),
        ],
    )
}

/// Every engagement counter of one content item.
pub fn recount_content(store: &Store, target: &ContentRef) -> StoreResult<()> {
    recount_all(
        store,
        &[
            Counter::Replies(target.clone()),
            Counter::Reposts(target.clone()),
            Counter::Likes(target.clone()),
            Counter::Bookmarks(target.clone()),
        ],
    )
}

/// Reply count of `target` as it will be once `excluded_id` is gone. Lets a
/// cascade settle the parent before deleting the reply itself.
pub fn recount_replies_without(store: &Store, target: &ContentRef, excluded_id: &str) -> StoreResult<i64> {
    let conn = store.lock()?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM replies WHERE target_type = ?1 AND target_id = ?2 AND id != ?3",
        params![target.kind.as_str(), &target.id, excluded_id],
        |row| row.get(0),
    )?;
    conn.execute(
        &format!("UPDATE {} SET reply_count = ?1 WHERE id = ?2", target.kind.table()),
        params![count, &target.id],
    )?;
    log::debug!("Recounted replies of {} {} without {} = {}", target.kind, target.id, excluded_id, count);
    Ok(count)
}

/// Adds a view to each item. Failures are logged and dropped: view counts are
/// best effort and must never fail a read.
pub fn bump_view_counts(store: &Store, targets: &[ContentRef]) {
    if targets.is_empty() {
        return;
    }
    if let Err(e) = store.bump_view_counts(targets) {
        log::warn!("Failed to bump view counts for {} items: {}", targets.len(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::store::test_support::user;
    use chrono::Utc;

    fn make_post(store: &Store, author: &User) -> Post {
        let mut post = Post {
            id: String::new(),
            author_id: author.id.clone(),
            content: "counted".to_string(),
            media_file: String::new(),
            counters: ContentCounters::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.create_post(&mut post).unwrap();
        post
    }

    #[test]
    fn test_recount_likes_matches_edges_and_is_idempotent() {
        let store = Store::in_memory().unwrap();
        let author = user(&store, "author");
        let post = make_post(&store, &author);
        let target = ContentRef::post(&post.id);

        for name in ["l1", "l2", "l3"] {
            let liker = user(&store, name);
            let mut like = Like {
                id: String::new(),
                author_id: liker.id.clone(),
                target: target.clone(),
                created_at: Utc::now(),
            };
            store.create_like(&mut like).unwrap();
        }

        let counter = Counter::Likes(target.clone());
        assert_eq!(recount(&store, &counter).unwrap(), 3);
        assert_eq!(recount(&store, &counter).unwrap(), 3);
        assert_eq!(recount(&store, &counter).unwrap(), 3);
        assert_eq!(store.get_post(&post.id).unwrap().counters.like_count, 3);
    }

    #[test]
    fn test_recount_overwrites_drifted_value() {
        let store = Store::in_memory().unwrap();
        let author = user(&store, "author");
        let post = make_post(&store, &author);
        {
            let conn = store.lock().unwrap();
            conn.execute("UPDATE posts SET bookmark_count = 42 WHERE id = ?1", params![&post.id])
                .unwrap();
        }
        recount_content(&store, &ContentRef::post(&post.id)).unwrap();
        assert_eq!(store.get_post(&post.id).unwrap().counters.bookmark_count, 0);
    }

    #[test]
    fn test_recount_follow_updates_both_sides() {
        let store = Store::in_memory().unwrap();
        let a = user(&store, "a");
        let b = user(&store, "b");
        let mut follow = Follow {
            id: String::new(),
            follower_id: a.id.clone(),
            followee_id: b.id.clone(),
            created_at: Utc::now(),
        };
        store.create_follow(&mut follow).unwrap();
        recount_follow(&store, &a.id, &b.id).unwrap();

        assert_eq!(store.get_user(&a.id).unwrap().following_count, 1);
        assert_eq!(store.get_user(&b.id).unwrap().follower_count, 1);
        assert_eq!(store.get_user(&a.id).unwrap().follower_count, 0);
    }

    #[test]
    fn test_recount_missing_row_is_not_an_error() {
        let store = Store::in_memory().unwrap();
        assert_eq!(recount(&store, &Counter::Replies(ContentRef::post("gone"))).unwrap(), 0);
        assert_eq!(recount(&store, &Counter::Posts("nobody".to_string())).unwrap(), 0);
    }
}
