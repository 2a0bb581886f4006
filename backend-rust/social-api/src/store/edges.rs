use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;
use uuid::Uuid;

use super::content::split_by_kind;
use super::{parse_datetime, placeholders, timestamp, Store, StoreResult, MAX_IDS_PER_QUERY};
use crate::models::*;

impl Store {
    // ==================== Follow Operations ====================

    pub fn create_follow(&self, follow: &mut Follow) -> StoreResult<()> {
        let conn = self.lock()?;
        follow.id = Uuid::new_v4().to_string();
        follow.created_at = Utc::now();

        conn.execute(
            r#"INSERT INTO follows (id, follower_id, followee_id, created_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![
                &follow.id,
                &follow.follower_id,
                &follow.followee_id,
                timestamp(&follow.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_follow(&self, follower_id: &str, followee_id: &str) -> StoreResult<Option<Follow>> {
        let conn = self.lock()?;
        let follow = conn
            .query_row(
                "SELECT * FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                params![follower_id, followee_id],
                row_to_follow,
            )
            .optional()?;
        Ok(follow)
    }

    pub fn delete_follow(&self, follower_id: &str, followee_id: &str) -> StoreResult<usize> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower_id, followee_id],
        )?;
        Ok(rows)
    }

    /// Every edge between the viewer and any of `others`, in either direction.
    pub fn follow_edges_between(&self, viewer_id: &str, others: &[String]) -> StoreResult<Vec<Follow>> {
        let conn = self.lock()?;
        let mut edges = Vec::new();
        for chunk in others.chunks(MAX_IDS_PER_QUERY) {
            let list = placeholders(chunk.len());
            let mut values = vec![Value::Text(viewer_id.to_string())];
            values.extend(chunk.iter().cloned().map(Value::Text));
            values.extend(chunk.iter().cloned().map(Value::Text));
            values.push(Value::Text(viewer_id.to_string()));

            let mut stmt = conn.prepare(&format!(
                r#"SELECT * FROM follows
                   WHERE (follower_id = ? AND followee_id IN ({list}))
                      OR (follower_id IN ({list}) AND followee_id = ?)"#,
                list = list
            ))?;
            let found = stmt
                .query_map(params_from_iter(values.iter()), row_to_follow)?
                .collect::<Result<Vec<_>, _>>()?;
            edges.extend(found);
        }
        Ok(edges)
    }

    /// Ids of users following `user_id`, newest edge first.
    pub fn list_follower_ids(&self, user_id: &str, page: &Pagination) -> StoreResult<(Vec<String>, i64)> {
        let conn = self.lock()?;
        page_of_ids(&conn, "follower_id", "followee_id", user_id, page)
    }

    /// Ids of users `user_id` follows, newest edge first.
    pub fn list_followee_ids(&self, user_id: &str, page: &Pagination) -> StoreResult<(Vec<String>, i64)> {
        let conn = self.lock()?;
        page_of_ids(&conn, "followee_id", "follower_id", user_id, page)
    }

    // ==================== Like Operations ====================

    pub fn create_like(&self, like: &mut Like) -> StoreResult<()> {
        let conn = self.lock()?;
        like.id = Uuid::new_v4().to_string();
        like.created_at = Utc::now();

        conn.execute(
            r#"INSERT INTO likes (id, author_id, target_type, target_id, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                &like.id,
                &like.author_id,
                like.target.kind,
                &like.target.id,
                timestamp(&like.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_like(&self, author_id: &str, target: &ContentRef) -> StoreResult<Option<Like>> {
        let conn = self.lock()?;
        let like = conn
            .query_row(
                "SELECT * FROM likes WHERE author_id = ?1 AND target_type = ?2 AND target_id = ?3",
                params![author_id, target.kind, &target.id],
                row_to_like,
            )
            .optional()?;
        Ok(like)
    }

    pub fn delete_like(&self, id: &str) -> StoreResult<usize> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM likes WHERE id = ?1", params![id])?;
        Ok(rows)
    }

    /// Likes given by a user, newest first.
    pub fn list_likes_by(&self, author_id: &str, page: &Pagination) -> StoreResult<(Vec<Like>, i64)> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE author_id = ?1",
            params![author_id],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(
            "SELECT * FROM likes WHERE author_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
        )?;
        let likes = stmt
            .query_map(params![author_id, page.limit, page.offset()], row_to_like)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((likes, count))
    }

    pub fn delete_likes_for(&self, targets: &[ContentRef]) -> StoreResult<usize> {
        let conn = self.lock()?;
        delete_edges_for(&conn, "likes", targets)
    }

    // ==================== Bookmark Operations ====================

    pub fn create_bookmark(&self, bookmark: &mut Bookmark) -> StoreResult<()> {
        let conn = self.lock()?;
        bookmark.id = Uuid::new_v4().to_string();
        bookmark.created_at = Utc::now();

        conn.execute(
            r#"INSERT INTO bookmarks (id, user_id, target_type, target_id, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                &bookmark.id,
                &bookmark.user_id,
                bookmark.target.kind,
                &bookmark.target.id,
                timestamp(&bookmark.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn delete_bookmark(&self, user_id: &str, target: &ContentRef) -> StoreResult<usize> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM bookmarks WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
            params![user_id, target.kind, &target.id],
        )?;
        Ok(rows)
    }

    pub fn list_bookmarks(&self, user_id: &str, page: &Pagination) -> StoreResult<(Vec<Bookmark>, i64)> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bookmarks WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(
            "SELECT * FROM bookmarks WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
        )?;
        let bookmarks = stmt
            .query_map(params![user_id, page.limit, page.offset()], |row| {
                Ok(Bookmark {
                    id: row.get("id")?,
                    user_id: row.get("user_id")?,
                    target: ContentRef::new(row.get("target_type")?, row.get::<_, String>("target_id")?),
                    created_at: parse_datetime(row.get::<_, String>("created_at")?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((bookmarks, count))
    }

    pub fn delete_bookmarks_for(&self, targets: &[ContentRef]) -> StoreResult<usize> {
        let conn = self.lock()?;
        delete_edges_for(&conn, "bookmarks", targets)
    }

    // ==================== Engagement Lookups ====================

    /// Of `target_ids`, those the viewer has liked.
    pub fn liked_ids(&self, viewer_id: &str, target_ids: &[String]) -> StoreResult<HashSet<String>> {
        self.edge_targets("SELECT target_id FROM likes WHERE author_id = ? AND target_id IN", viewer_id, target_ids)
    }

    /// Of `target_ids`, those the viewer has reposted.
    pub fn reposted_ids(&self, viewer_id: &str, target_ids: &[String]) -> StoreResult<HashSet<String>> {
        self.edge_targets(
            "SELECT repost_id FROM user_threads WHERE user_id = ? AND repost_id IN",
            viewer_id,
            target_ids,
        )
    }

    /// Of `target_ids`, those the viewer has bookmarked.
    pub fn bookmarked_ids(&self, viewer_id: &str, target_ids: &[String]) -> StoreResult<HashSet<String>> {
        self.edge_targets(
            "SELECT target_id FROM bookmarks WHERE user_id = ? AND target_id IN",
            viewer_id,
            target_ids,
        )
    }

    fn edge_targets(&self, select: &str, viewer_id: &str, target_ids: &[String]) -> StoreResult<HashSet<String>> {
        if target_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let conn = self.lock()?;
        let mut values = vec![Value::Text(viewer_id.to_string())];
        values.extend(target_ids.iter().cloned().map(Value::Text));
        let mut stmt = conn.prepare(&format!("{} ({})", select, placeholders(target_ids.len())))?;
        let ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }
}

fn page_of_ids(
    conn: &Connection,
    select_column: &str,
    match_column: &str,
    user_id: &str,
    page: &Pagination,
) -> StoreResult<(Vec<String>, i64)> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM follows WHERE {} = ?1", match_column),
        params![user_id],
        |row| row.get(0),
    )?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM follows WHERE {} = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
        select_column, match_column
    ))?;
    let ids = stmt
        .query_map(params![user_id, page.limit, page.offset()], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok((ids, count))
}

fn delete_edges_for(conn: &Connection, table: &str, targets: &[ContentRef]) -> StoreResult<usize> {
    let mut rows = 0;
    for (kind, ids) in split_by_kind(targets) {
        if ids.is_empty() {
            continue;
        }
        let mut values = vec![Value::Text(kind.as_str().to_string())];
        values.extend(ids.iter().cloned().map(Value::Text));
        rows += conn.execute(
            &format!(
                "DELETE FROM {} WHERE target_type = ? AND target_id IN ({})",
                table,
                placeholders(ids.len())
            ),
            params_from_iter(values.iter()),
        )?;
    }
    Ok(rows)
}

fn row_to_follow(row: &rusqlite::Row) -> rusqlite::Result<Follow> {
    Ok(Follow {
        id: row.get("id")?,
        follower_id: row.get("follower_id")?,
        followee_id: row.get("followee_id")?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
    })
}

fn row_to_like(row: &rusqlite::Row) -> rusqlite::Result<Like> {
    Ok(Like {
        id: row.get("id")?,
        author_id: row.get("author_id")?,
        target: ContentRef::new(row.get("target_type")?, row.get::<_, String>("target_id")?),
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::user;

    fn follow(store: &Store, follower: &User, followee: &User) {
        let mut edge = Follow {
            id: String::new(),
            follower_id: follower.id.clone(),
            followee_id: followee.id.clone(),
            created_at: Utc::now(),
        };
        store.create_follow(&mut edge).unwrap();
    }

    #[test]
    fn test_duplicate_follow_rejected() {
        let store = Store::in_memory().unwrap();
        let alice = user(&store, "alice");
        let bob = user(&store, "bob");
        follow(&store, &alice, &bob);

        let mut dup = Follow {
            id: String::new(),
            follower_id: alice.id.clone(),
            followee_id: bob.id.clone(),
            created_at: Utc::now(),
        };
        assert!(store.create_follow(&mut dup).unwrap_err().is_unique_violation());
        assert!(store.get_follow(&alice.id, &bob.id).unwrap().is_some());
        assert!(store.get_follow(&bob.id, &alice.id).unwrap().is_none());
    }

    #[test]
    fn test_follow_edges_between_both_directions() {
        let store = Store::in_memory().unwrap();
        let viewer = user(&store, "viewer");
        let a = user(&store, "a");
        let b = user(&store, "b");
        let c = user(&store, "c");
        follow(&store, &viewer, &a);
        follow(&store, &b, &viewer);
        follow(&store, &a, &b);
        follow(&store, &c, &a);

        let edges = store
            .follow_edges_between(&viewer.id, &[a.id.clone(), b.id.clone(), c.id.clone()])
            .unwrap();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.follower_id == viewer.id || e.followee_id == viewer.id));
        assert!(store.follow_edges_between(&viewer.id, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_follow_edges_between_many_ids() {
        let store = Store::in_memory().unwrap();
        let viewer = user(&store, "viewer");
        let a = user(&store, "a");
        let b = user(&store, "b");
        follow(&store, &viewer, &a);
        follow(&store, &b, &viewer);

        let mut others: Vec<String> = (0..MAX_IDS_PER_QUERY * 2).map(|i| format!("ghost-{}", i)).collect();
        others.insert(0, a.id.clone());
        others.push(b.id.clone());
        let edges = store.follow_edges_between(&viewer.id, &others).unwrap();
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_follower_and_followee_pages() {
        let store = Store::in_memory().unwrap();
        let alice = user(&store, "alice");
        let bob = user(&store, "bob");
        let carol = user(&store, "carol");
        follow(&store, &bob, &alice);
        follow(&store, &carol, &alice);
        follow(&store, &alice, &carol);

        let (followers, count) = store.list_follower_ids(&alice.id, &Pagination::default()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(followers, vec![carol.id.clone(), bob.id.clone()]);

        let (followees, count) = store.list_followee_ids(&alice.id, &Pagination::default()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(followees, vec![carol.id.clone()]);
    }

    #[test]
    fn test_engagement_lookups_only_return_viewer_edges() {
        let store = Store::in_memory().unwrap();
        let alice = user(&store, "alice");
        let bob = user(&store, "bob");
        let target = ContentRef::post("p1");

        let mut like = Like {
            id: String::new(),
            author_id: alice.id.clone(),
            target: target.clone(),
            created_at: Utc::now(),
        };
        store.create_like(&mut like).unwrap();
        let mut bookmark = Bookmark {
            id: String::new(),
            user_id: bob.id.clone(),
            target: target.clone(),
            created_at: Utc::now(),
        };
        store.create_bookmark(&mut bookmark).unwrap();

        let ids = vec!["p1".to_string(), "p2".to_string()];
        assert!(store.liked_ids(&alice.id, &ids).unwrap().contains("p1"));
        assert!(store.liked_ids(&bob.id, &ids).unwrap().is_empty());
        assert!(store.bookmarked_ids(&bob.id, &ids).unwrap().contains("p1"));
        assert!(store.bookmarked_ids(&alice.id, &ids).unwrap().is_empty());
        assert!(store.reposted_ids(&alice.id, &ids).unwrap().is_empty());

        assert_eq!(store.delete_likes_for(&[target.clone()]).unwrap(), 1);
        assert_eq!(store.delete_bookmarks_for(&[target]).unwrap(), 1);
        assert!(store.find_like(&alice.id, &ContentRef::post("p1")).unwrap().is_none());
    }
}
