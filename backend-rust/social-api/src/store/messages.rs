use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use std::collections::HashSet;
use uuid::Uuid;

use super::{parse_datetime, placeholders, timestamp, Store, StoreError, StoreResult};
use crate::models::Message;

impl Store {
    // ==================== Message Operations ====================

    pub fn create_message(&self, message: &mut Message) -> StoreResult<()> {
        let conn = self.lock()?;
        message.id = Uuid::new_v4().to_string();
        message.created_at = Utc::now();
        message.is_read = false;

        conn.execute(
            r#"INSERT INTO messages (id, from_id, to_id, content, is_read, created_at)
               VALUES (?1, ?2, ?3, ?4, 0, ?5)"#,
            params![
                &message.id,
                &message.from_id,
                &message.to_id,
                &message.content,
                timestamp(&message.created_at),
            ],
        )?;
        Ok(())
    }

    /// Every message the user sent or received, oldest first.
    pub fn list_messages_of(&self, user_id: &str) -> StoreResult<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM messages WHERE from_id = ?1 OR to_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let messages = stmt
            .query_map(params![user_id], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// The conversation between two users, oldest first.
    pub fn list_conversation(&self, user_id: &str, other_id: &str) -> StoreResult<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"SELECT * FROM messages
               WHERE (from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1)
               ORDER BY created_at ASC, rowid ASC"#,
        )?;
        let messages = stmt
            .query_map(params![user_id, other_id], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Marks messages addressed to `recipient_id` as read. Fails without writing
    /// when any id is unknown or not addressed to the recipient.
    pub fn mark_messages_read(&self, recipient_id: &str, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let list = placeholders(ids.len());
        let mut values = vec![Value::Text(recipient_id.to_string())];
        values.extend(ids.iter().cloned().map(Value::Text));

        let found: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM messages WHERE to_id = ? AND id IN ({})", list),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        if found != ids.iter().collect::<HashSet<_>>().len() as i64 {
            return Err(StoreError::NotFound("Message".to_string()));
        }

        let rows = conn.execute(
            &format!("UPDATE messages SET is_read = 1 WHERE to_id = ? AND id IN ({})", list),
            params_from_iter(values.iter()),
        )?;
        Ok(rows)
    }
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get("id")?,
        from_id: row.get("from_id")?,
        to_id: row.get("to_id")?,
        content: row.get("content")?,
        is_read: row.get("is_read")?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
    })
}
