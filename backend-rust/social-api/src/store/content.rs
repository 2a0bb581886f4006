use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use uuid::Uuid;

use super::{not_found, parse_datetime, placeholders, timestamp, Store, StoreError, StoreResult};
use crate::models::*;

/// Which timeline entries a feed query selects.
#[derive(Debug, Clone, Copy)]
pub enum FeedFilter<'a> {
    /// Original posts of everyone, optionally skipping one user and matching content.
    OriginalPosts {
        exclude_user: Option<&'a str>,
        search_text: Option<&'a str>,
    },
    /// Every activity of a user and of everyone they follow.
    Followees { user_id: &'a str },
    /// A user's posts and reposts; `original` drops the reposts.
    UserPosts { user_id: &'a str, original: bool },
    /// A user's replies.
    UserReplies { user_id: &'a str },
}

impl FeedFilter<'_> {
    fn where_clause(self) -> (String, Vec<Value>) {
        match self {
            FeedFilter::OriginalPosts { exclude_user, search_text } => {
                let mut clause = "post_id IS NOT NULL".to_string();
                let mut values = Vec::new();
                if let Some(user_id) = exclude_user {
                    clause.push_str(" AND user_id != ?");
                    values.push(Value::Text(user_id.to_string()));
                }
                if let Some(text) = search_text.map(str::trim).filter(|s| !s.is_empty()) {
                    clause.push_str(" AND post_id IN (SELECT id FROM posts WHERE lower(content) LIKE ?)");
                    values.push(Value::Text(format!("%{}%", text.to_lowercase())));
                }
                (clause, values)
            }
            FeedFilter::Followees { user_id } => (
                "(user_id = ? OR user_id IN (SELECT followee_id FROM follows WHERE follower_id = ?))".to_string(),
                vec![Value::Text(user_id.to_string()), Value::Text(user_id.to_string())],
            ),
            FeedFilter::UserPosts { user_id, original } => {
                let clause = if original {
                    "user_id = ? AND post_id IS NOT NULL"
                } else {
                    "user_id = ? AND reply_id IS NULL"
                };
                (clause.to_string(), vec![Value::Text(user_id.to_string())])
            }
            FeedFilter::UserReplies { user_id } => (
                "user_id = ? AND reply_id IS NOT NULL".to_string(),
                vec![Value::Text(user_id.to_string())],
            ),
        }
    }
}

impl Store {
    // ==================== Post Operations ====================

    pub fn create_post(&self, post: &mut Post) -> StoreResult<()> {
        let conn = self.lock()?;
        post.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        post.created_at = now;
        post.updated_at = now;
        post.counters = ContentCounters::default();

        conn.execute(
            r#"INSERT INTO posts (id, author_id, content, media_file, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                &post.id,
                &post.author_id,
                &post.content,
                &post.media_file,
                timestamp(&post.created_at),
                timestamp(&post.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_post(&self, id: &str) -> StoreResult<Post> {
        let conn = self.lock()?;
        conn.query_row("SELECT * FROM posts WHERE id = ?1", params![id], row_to_post)
            .map_err(not_found(format!("Post {}", id)))
    }

    // ==================== Reply Operations ====================

    /// Inserts the reply and its ancestor chain. `links` must already be set.
    pub fn create_reply(&self, reply: &mut Reply) -> StoreResult<()> {
        let conn = self.lock()?;
        reply.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        reply.created_at = now;
        reply.updated_at = now;
        reply.counters = ContentCounters::default();

        conn.execute(
            r#"INSERT INTO replies (id, author_id, content, media_file, target_type, target_id, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                &reply.id,
                &reply.author_id,
                &reply.content,
                &reply.media_file,
                reply.target.kind,
                &reply.target.id,
                timestamp(&reply.created_at),
                timestamp(&reply.updated_at),
            ],
        )?;

        let mut stmt =
            conn.prepare("INSERT INTO reply_links (reply_id, ancestor_id, position) VALUES (?1, ?2, ?3)")?;
        for (position, ancestor) in reply.links.iter().enumerate() {
            stmt.execute(params![&reply.id, ancestor, position as i64])?;
        }
        Ok(())
    }

    pub fn get_reply(&self, id: &str) -> StoreResult<Reply> {
        self.get_replies_by_ids(&[id.to_string()])?
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("Reply {}", id)))
    }

    pub fn get_replies_by_ids(&self, ids: &[String]) -> StoreResult<HashMap<String, Reply>> {
        let conn = self.lock()?;
        replies_by_ids(&conn, ids)
    }

    /// Replies directly under a target, newest first.
    pub fn list_replies_of(
        &self,
        target: &ContentRef,
        page: &Pagination,
    ) -> StoreResult<(Vec<Reply>, i64)> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM replies WHERE target_type = ?1 AND target_id = ?2",
            params![target.kind, &target.id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            r#"SELECT id FROM replies WHERE target_type = ?1 AND target_id = ?2
               ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4"#,
        )?;
        let ids = stmt
            .query_map(params![target.kind, &target.id, page.limit, page.offset()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut found = replies_by_ids(&conn, &ids)?;
        let replies = ids.iter().filter_map(|id| found.remove(id)).collect();
        Ok((replies, count))
    }

    /// Replies whose ancestor chain contains `ancestor_id`, as `(id, author_id)`.
    pub fn replies_descending_from(&self, ancestor_id: &str) -> StoreResult<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"SELECT DISTINCT r.id, r.author_id FROM replies r
               JOIN reply_links l ON l.reply_id = r.id
               WHERE l.ancestor_id = ?1"#,
        )?;
        let rows = stmt
            .query_map(params![ancestor_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_replies(&self, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let list = placeholders(ids.len());
        tx.execute(
            &format!("DELETE FROM reply_links WHERE reply_id IN ({})", list),
            params_from_iter(ids.iter()),
        )?;
        let rows = tx.execute(
            &format!("DELETE FROM replies WHERE id IN ({})", list),
            params_from_iter(ids.iter()),
        )?;
        tx.commit()?;
        Ok(rows)
    }

    pub fn delete_post(&self, id: &str) -> StoreResult<usize> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(rows)
    }

    // ==================== Shared Content Operations ====================

    pub fn get_content(&self, target: &ContentRef) -> StoreResult<ContentItem> {
        match target.kind {
            ContentKind::Post => self.get_post(&target.id).map(ContentItem::Post),
            ContentKind::Reply => self.get_reply(&target.id).map(ContentItem::Reply),
        }
    }

    pub fn update_content(&self, target: &ContentRef, update: &UpdateContentRequest) -> StoreResult<()> {
        let conn = self.lock()?;
        let rows = conn.execute(
            &format!(
                r#"UPDATE {} SET content = COALESCE(?1, content), media_file = COALESCE(?2, media_file),
                   updated_at = ?3 WHERE id = ?4"#,
                target.kind.table()
            ),
            params![&update.content, &update.media_file, timestamp(&Utc::now()), &target.id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("{} {}", target.kind, target.id)));
        }
        Ok(())
    }

    /// Adds one view to every referenced item.
    pub fn bump_view_counts(&self, targets: &[ContentRef]) -> StoreResult<()> {
        let conn = self.lock()?;
        for (kind, ids) in split_by_kind(targets) {
            if ids.is_empty() {
                continue;
            }
            conn.execute(
                &format!(
                    "UPDATE {} SET view_count = view_count + 1 WHERE id IN ({})",
                    kind.table(),
                    placeholders(ids.len())
                ),
                params_from_iter(ids.iter()),
            )?;
        }
        Ok(())
    }

    // ==================== Thread Operations ====================

    pub fn create_thread(&self, thread: &mut UserThread) -> StoreResult<()> {
        let conn = self.lock()?;
        thread.id = Uuid::new_v4().to_string();
        thread.created_at = Utc::now();

        let (post_id, reply_id, repost_type, repost_id) = match &thread.activity {
            ThreadActivity::Post { post } => (Some(post.as_str()), None, None, None),
            ThreadActivity::Reply { reply } => (None, Some(reply.as_str()), None, None),
            ThreadActivity::Repost { repost } => (None, None, Some(repost.kind), Some(repost.id.as_str())),
        };

        conn.execute(
            r#"INSERT INTO user_threads (id, user_id, post_id, reply_id, repost_type, repost_id, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &thread.id,
                &thread.user_id,
                post_id,
                reply_id,
                repost_type,
                repost_id,
                timestamp(&thread.created_at),
            ],
        )?;
        Ok(())
    }

    /// The viewer's repost entry for a content id, whichever kind it is.
    pub fn find_repost(&self, user_id: &str, repost_id: &str) -> StoreResult<Option<UserThread>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT * FROM user_threads WHERE user_id = ?1 AND repost_id = ?2",
                params![user_id, repost_id],
                ThreadRow::from_row,
            )
            .optional()?;
        row.map(UserThread::try_from).transpose()
    }

    pub fn delete_thread(&self, id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM user_threads WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("Thread {}", id)));
        }
        Ok(())
    }

    /// Timeline entries matching the filter, newest first, with the total count.
    pub fn list_threads(
        &self,
        filter: FeedFilter<'_>,
        page: &Pagination,
    ) -> StoreResult<(Vec<UserThread>, i64)> {
        let (clause, mut values) = filter.where_clause();
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM user_threads WHERE {}", clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Value::Integer(page.limit));
        values.push(Value::Integer(page.offset()));
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM user_threads WHERE {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            clause
        ))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), ThreadRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let threads = rows
            .into_iter()
            .map(UserThread::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((threads, count))
    }

    /// Removes every timeline entry that shows one of the targets. Returns the
    /// distinct owners of the removed entries.
    /// Removes timeline entries of the targets and reposts of them, then
    /// refreshes each owner's post count in the same transaction. Returns
    /// the owners.
    pub fn delete_threads_for(&self, targets: &[ContentRef]) -> StoreResult<Vec<String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut owners = Vec::new();
        for (kind, ids) in split_by_kind(targets) {
            if ids.is_empty() {
                continue;
            }
            let own_column = match kind {
                ContentKind::Post => "post_id",
                ContentKind::Reply => "reply_id",
            };
            let clause = format!(
                "{col} IN ({list}) OR (repost_type = ? AND repost_id IN ({list}))",
                col = own_column,
                list = placeholders(ids.len())
            );
            let mut values: Vec<Value> = ids.iter().cloned().map(Value::Text).collect();
            values.push(Value::Text(kind.as_str().to_string()));
            values.extend(ids.iter().cloned().map(Value::Text));

            {
                let mut stmt = tx.prepare(&format!("SELECT DISTINCT user_id FROM user_threads WHERE {}", clause))?;
                let found = stmt
                    .query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                owners.extend(found);
            }

            tx.execute(
                &format!("DELETE FROM user_threads WHERE {}", clause),
                params_from_iter(values.iter()),
            )?;
        }
        owners.sort();
        owners.dedup();

        for owner in &owners {
            tx.execute(
                "UPDATE users SET post_count = (SELECT COUNT(*) FROM user_threads WHERE user_id = ?1) WHERE id = ?1",
                params![owner],
            )?;
        }
        tx.commit()?;
        Ok(owners)
    }
}

/// Groups references by kind, posts first.
pub(crate) fn split_by_kind(targets: &[ContentRef]) -> [(ContentKind, Vec<String>); 2] {
    let mut posts = Vec::new();
    let mut replies = Vec::new();
    for target in targets {
        match target.kind {
            ContentKind::Post => posts.push(target.id.clone()),
            ContentKind::Reply => replies.push(target.id.clone()),
        }
    }
    [(ContentKind::Post, posts), (ContentKind::Reply, replies)]
}

pub(super) fn posts_by_ids(conn: &Connection, ids: &[String]) -> StoreResult<HashMap<String, Post>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM posts WHERE id IN ({})",
        placeholders(ids.len())
    ))?;
    let posts = stmt
        .query_map(params_from_iter(ids.iter()), row_to_post)?
        .map(|r| r.map(|p| (p.id.clone(), p)))
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(posts)
}

pub(super) fn replies_by_ids(conn: &Connection, ids: &[String]) -> StoreResult<HashMap<String, Reply>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let list = placeholders(ids.len());
    let mut stmt = conn.prepare(&format!("SELECT * FROM replies WHERE id IN ({})", list))?;
    let mut replies = stmt
        .query_map(params_from_iter(ids.iter()), row_to_reply)?
        .map(|r| r.map(|reply| (reply.id.clone(), reply)))
        .collect::<Result<HashMap<_, _>, _>>()?;

    let mut links_stmt = conn.prepare(&format!(
        "SELECT reply_id, ancestor_id FROM reply_links WHERE reply_id IN ({}) ORDER BY reply_id, position",
        list
    ))?;
    let links = links_stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for link in links {
        let (reply_id, ancestor_id) = link?;
        if let Some(reply) = replies.get_mut(&reply_id) {
            reply.links.push(ancestor_id);
        }
    }
    Ok(replies)
}

fn row_to_counters(row: &rusqlite::Row) -> rusqlite::Result<ContentCounters> {
    Ok(ContentCounters {
        reply_count: row.get("reply_count")?,
        repost_count: row.get("repost_count")?,
        like_count: row.get("like_count")?,
        bookmark_count: row.get("bookmark_count")?,
        view_count: row.get("view_count")?,
    })
}

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get("id")?,
        author_id: row.get("author_id")?,
        content: row.get("content")?,
        media_file: row.get("media_file")?,
        counters: row_to_counters(row)?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn row_to_reply(row: &rusqlite::Row) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: row.get("id")?,
        author_id: row.get("author_id")?,
        content: row.get("content")?,
        media_file: row.get("media_file")?,
        target: ContentRef::new(row.get("target_type")?, row.get::<_, String>("target_id")?),
        links: Vec::new(),
        counters: row_to_counters(row)?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

/// Raw `user_threads` columns before the one-slot rule is checked.
struct ThreadRow {
    id: String,
    user_id: String,
    post_id: Option<String>,
    reply_id: Option<String>,
    repost_type: Option<ContentKind>,
    repost_id: Option<String>,
    created_at: String,
}

impl ThreadRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            post_id: row.get("post_id")?,
            reply_id: row.get("reply_id")?,
            repost_type: row.get("repost_type")?,
            repost_id: row.get("repost_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl TryFrom<ThreadRow> for UserThread {
    type Error = StoreError;

    fn try_from(row: ThreadRow) -> Result<Self, Self::Error> {
        let activity = match (row.post_id, row.reply_id, row.repost_type, row.repost_id) {
            (Some(post), None, None, None) => ThreadActivity::Post { post },
            (None, Some(reply), None, None) => ThreadActivity::Reply { reply },
            (None, None, Some(kind), Some(id)) => ThreadActivity::Repost {
                repost: ContentRef::new(kind, id),
            },
            _ => return Err(StoreError::Corrupt(format!("Thread {} has no single activity", row.id))),
        };
        Ok(UserThread {
            id: row.id,
            user_id: row.user_id,
            activity,
            created_at: parse_datetime(row.created_at),
        })
    }
}
