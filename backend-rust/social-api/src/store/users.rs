use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;
use uuid::Uuid;

use super::{not_found, parse_datetime, placeholders, timestamp, Store, StoreResult};
use crate::models::{Pagination, UpdateProfileRequest, User};

impl Store {
    // ==================== User Operations ====================

    pub fn create_user(&self, user: &mut User) -> StoreResult<()> {
        let conn = self.lock()?;
        user.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        user.created_at = now;
        user.updated_at = now;

        conn.execute(
            r#"INSERT INTO users (id, username, email, password_hash, display_name, avatar, header,
                bio, location, post_count, follower_count, following_count, is_deleted, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, 0, 0, ?10, ?11)"#,
            params![
                &user.id,
                &user.username,
                &user.email,
                &user.password_hash,
                &user.display_name,
                &user.avatar,
                &user.header,
                &user.bio,
                &user.location,
                timestamp(&user.created_at),
                timestamp(&user.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> StoreResult<User> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT * FROM users WHERE id = ?1 AND is_deleted = 0",
            params![id],
            row_to_user,
        )
        .map_err(not_found(format!("User {}", id)))
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1 AND is_deleted = 0",
            params![username],
            row_to_user,
        )
        .map_err(not_found(format!("User {}", username)))
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT * FROM users WHERE email = ?1 AND is_deleted = 0",
            params![email],
            row_to_user,
        )
        .map_err(not_found(format!("User {}", email)))
    }

    /// True when either the username or the email is already registered.
    pub fn user_exists(&self, username: &str, email: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1 OR email = ?2",
            params![username, email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Live users keyed by id. Unknown and soft-deleted ids are absent.
    pub fn get_users_by_ids(&self, ids: &[String]) -> StoreResult<HashMap<String, User>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.lock()?;
        users_by_ids(&conn, ids, false)
    }

    pub fn list_users(
        &self,
        search_text: Option<&str>,
        page: &Pagination,
    ) -> StoreResult<(Vec<User>, i64)> {
        let conn = self.lock()?;
        let pattern = search_text
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let filter = "is_deleted = 0 AND (?1 IS NULL OR lower(username) LIKE ?1 OR lower(display_name) LIKE ?1)";
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM users WHERE {}", filter),
            params![pattern],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM users WHERE {} ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            filter
        ))?;
        let users = stmt
            .query_map(params![pattern, page.limit, page.offset()], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, count))
    }

    pub fn update_profile(&self, id: &str, update: &UpdateProfileRequest) -> StoreResult<User> {
        let mut user = self.get_user(id)?;
        if let Some(display_name) = &update.display_name {
            user.display_name = display_name.clone();
        }
        if let Some(avatar) = &update.avatar {
            user.avatar = avatar.clone();
        }
        if let Some(header) = &update.header {
            user.header = header.clone();
        }
        if let Some(bio) = &update.bio {
            user.bio = bio.clone();
        }
        if let Some(location) = &update.location {
            user.location = location.clone();
        }
        user.updated_at = Utc::now();

        let conn = self.lock()?;
        conn.execute(
            r#"UPDATE users SET display_name = ?1, avatar = ?2, header = ?3, bio = ?4, location = ?5,
               updated_at = ?6 WHERE id = ?7"#,
            params![
                &user.display_name,
                &user.avatar,
                &user.header,
                &user.bio,
                &user.location,
                timestamp(&user.updated_at),
                &user.id,
            ],
        )?;
        Ok(user)
    }

    /// Soft delete: the row stays so that edges keep resolving, but lookups skip it.
    pub fn soft_delete_user(&self, id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE users SET is_deleted = 1, updated_at = ?1 WHERE id = ?2",
            params![timestamp(&Utc::now()), id],
        )?;
        if rows == 0 {
            return Err(super::StoreError::NotFound(format!("User {}", id)));
        }
        Ok(())
    }
}

/// Users keyed by id. Population passes `include_deleted` so that content by a
/// soft-deleted author still renders.
pub(super) fn users_by_ids(
    conn: &Connection,
    ids: &[String],
    include_deleted: bool,
) -> StoreResult<HashMap<String, User>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let live = if include_deleted { "" } else { "is_deleted = 0 AND " };
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM users WHERE {}id IN ({})",
        live,
        placeholders(ids.len())
    ))?;
    let users = stmt
        .query_map(params_from_iter(ids.iter()), row_to_user)?
        .map(|r| r.map(|u| (u.id.clone(), u)))
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(users)
}

pub(super) fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        display_name: row.get("display_name")?,
        avatar: row.get("avatar")?,
        header: row.get("header")?,
        bio: row.get("bio")?,
        location: row.get("location")?,
        post_count: row.get("post_count")?,
        follower_count: row.get("follower_count")?,
        following_count: row.get("following_count")?,
        is_deleted: row.get("is_deleted")?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::user;
    use crate::store::StoreError;

    #[test]
    fn test_create_and_get_user() {
        let store = Store::in_memory().unwrap();
        let alice = user(&store, "alice");
        assert!(!alice.id.is_empty());

        let retrieved = store.get_user(&alice.id).unwrap();
        assert_eq!(retrieved.username, "alice");
        assert_eq!(retrieved.post_count, 0);
        assert_eq!(store.get_user_by_email("alice@example.com").unwrap().id, alice.id);
    }

    #[test]
    fn test_duplicate_username_is_unique_violation() {
        let store = Store::in_memory().unwrap();
        user(&store, "alice");
        let mut dup = User::new("alice", "Other", "other@example.com", "hash".to_string());
        let err = store.create_user(&mut dup).unwrap_err();
        assert!(err.is_unique_violation());
        assert!(store.user_exists("alice", "nobody@example.com").unwrap());
    }

    #[test]
    fn test_list_users_search_and_soft_delete() {
        let store = Store::in_memory().unwrap();
        let alice = user(&store, "alice");
        user(&store, "bob");
        user(&store, "alicia");

        let (found, count) = store.list_users(Some("ALI"), &Pagination::default()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(found.len(), 2);

        store.soft_delete_user(&alice.id).unwrap();
        let (found, count) = store.list_users(Some("ali"), &Pagination::default()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(found[0].username, "alicia");
        assert!(matches!(store.get_user(&alice.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_update_profile_keeps_unset_fields() {
        let store = Store::in_memory().unwrap();
        let alice = user(&store, "alice");
        let update = UpdateProfileRequest {
            bio: Some("hello".to_string()),
            ..Default::default()
        };
        let updated = store.update_profile(&alice.id, &update).unwrap();
        assert_eq!(updated.bio, "hello");
        assert_eq!(updated.display_name, "alice");
        assert_eq!(store.get_user(&alice.id).unwrap().bio, "hello");
    }
}
