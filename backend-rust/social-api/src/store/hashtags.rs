use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension};
use uuid::Uuid;

use super::{parse_datetime, placeholders, timestamp, Store, StoreResult};
use crate::models::Hashtag;

const SEARCH_LIMIT: i64 = 10;

impl Store {
    // ==================== Hashtag Operations ====================

    /// Hashtags whose name contains `search_text`, most used first.
    pub fn search_hashtags(&self, search_text: Option<&str>) -> StoreResult<Vec<Hashtag>> {
        let conn = self.lock()?;
        let pattern = search_text
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.trim_start_matches('#').to_lowercase()));

        let mut stmt = conn.prepare(
            r#"SELECT h.id, h.name, h.created_at, COUNT(hp.post_id) AS post_count
               FROM hashtags h LEFT JOIN hashtag_posts hp ON hp.hashtag_id = h.id
               WHERE ?1 IS NULL OR h.name LIKE ?1
               GROUP BY h.id
               ORDER BY post_count DESC, h.name ASC
               LIMIT ?2"#,
        )?;
        let tags = stmt
            .query_map(params![pattern, SEARCH_LIMIT], |row| {
                Ok(Hashtag {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    post_count: row.get("post_count")?,
                    created_at: parse_datetime(row.get::<_, String>("created_at")?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Associates each name with the post, creating missing hashtags. Returns only
    /// the hashtags created by this call.
    pub fn attach_hashtags(&self, post_id: &str, names: &[String]) -> StoreResult<Vec<Hashtag>> {
        let conn = self.lock()?;
        let mut created = Vec::new();

        for name in names {
            let name = normalize(name);
            if name.is_empty() {
                continue;
            }
            let existing: Option<String> = conn
                .query_row("SELECT id FROM hashtags WHERE name = ?1", params![&name], |row| row.get(0))
                .optional()?;

            let hashtag_id = match existing {
                Some(id) => id,
                None => {
                    let tag = Hashtag {
                        id: Uuid::new_v4().to_string(),
                        name: name.clone(),
                        post_count: 1,
                        created_at: Utc::now(),
                    };
                    conn.execute(
                        "INSERT INTO hashtags (id, name, created_at) VALUES (?1, ?2, ?3)",
                        params![&tag.id, &tag.name, timestamp(&tag.created_at)],
                    )?;
                    let id = tag.id.clone();
                    created.push(tag);
                    id
                }
            };

            conn.execute(
                "INSERT OR IGNORE INTO hashtag_posts (hashtag_id, post_id) VALUES (?1, ?2)",
                params![&hashtag_id, post_id],
            )?;
        }

        Ok(created)
    }

    pub fn detach_hashtags_from_posts(&self, post_ids: &[String]) -> StoreResult<usize> {
        if post_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let rows = conn.execute(
            &format!("DELETE FROM hashtag_posts WHERE post_id IN ({})", placeholders(post_ids.len())),
            params_from_iter(post_ids.iter()),
        )?;
        Ok(rows)
    }
}

/// Lowercase, no leading `#`.
fn normalize(name: &str) -> String {
    name.trim().trim_start_matches('#').to_lowercase()
}
