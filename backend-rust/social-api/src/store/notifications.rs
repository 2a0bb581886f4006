use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use uuid::Uuid;

use super::content::split_by_kind;
use super::{parse_datetime, placeholders, timestamp, Store, StoreError, StoreResult};
use crate::models::*;

impl Store {
    // ==================== Notification Operations ====================

    pub fn create_notification(&self, notif: &mut Notification) -> StoreResult<()> {
        let conn = self.lock()?;
        notif.id = Uuid::new_v4().to_string();
        notif.created_at = Utc::now();
        notif.is_read = false;

        let (mention_type, mention_id, repost_type, repost_id, reply_id) = match &notif.subject {
            NotificationSubject::Mention { location } => {
                (Some(location.kind), Some(location.id.as_str()), None, None, None)
            }
            NotificationSubject::Repost { repost } => {
                (None, None, Some(repost.kind), Some(repost.id.as_str()), None)
            }
            NotificationSubject::Reply { reply } => (None, None, None, None, Some(reply.as_str())),
            NotificationSubject::Follow => (None, None, None, None, None),
        };

        conn.execute(
            r#"INSERT INTO notifications (id, sender_id, recipient_id, event, mention_location_type,
                mention_location_id, repost_type, repost_id, reply_id, is_read, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)"#,
            params![
                &notif.id,
                &notif.sender_id,
                &notif.recipient_id,
                notif.subject.event().as_str(),
                mention_type,
                mention_id,
                repost_type,
                repost_id,
                reply_id,
                timestamp(&notif.created_at),
            ],
        )?;
        Ok(())
    }

    /// The viewer's notifications, newest first.
    pub fn list_notifications(
        &self,
        recipient_id: &str,
        page: &Pagination,
    ) -> StoreResult<(Vec<Notification>, i64)> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1",
            params![recipient_id],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(
            r#"SELECT * FROM notifications WHERE recipient_id = ?1
               ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"#,
        )?;
        let rows = stmt
            .query_map(params![recipient_id, page.limit, page.offset()], NotificationRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let notifs = rows
            .into_iter()
            .map(Notification::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((notifs, count))
    }

    /// Follow notifications from `sender_id` to `recipient_id`.
    pub fn find_follow_notifications(&self, sender_id: &str, recipient_id: &str) -> StoreResult<Vec<Notification>> {
        self.select_notifications(
            "sender_id = ? AND recipient_id = ? AND event = 'follow'",
            vec![Value::Text(sender_id.to_string()), Value::Text(recipient_id.to_string())],
        )
    }

    /// Repost notifications `sender_id` caused by reposting `repost`.
    pub fn find_repost_notifications(&self, sender_id: &str, repost: &ContentRef) -> StoreResult<Vec<Notification>> {
        self.select_notifications(
            "sender_id = ? AND event = 'repost' AND repost_type = ? AND repost_id = ?",
            vec![
                Value::Text(sender_id.to_string()),
                Value::Text(repost.kind.as_str().to_string()),
                Value::Text(repost.id.clone()),
            ],
        )
    }

    /// Every notification whose payload points at one of the targets.
    pub fn notifications_referencing(&self, targets: &[ContentRef]) -> StoreResult<Vec<Notification>> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for (kind, ids) in split_by_kind(targets) {
            if ids.is_empty() {
                continue;
            }
            let list = placeholders(ids.len());
            clauses.push(format!("(mention_location_type = ? AND mention_location_id IN ({}))", list));
            values.push(Value::Text(kind.as_str().to_string()));
            values.extend(ids.iter().cloned().map(Value::Text));

            clauses.push(format!("(repost_type = ? AND repost_id IN ({}))", list));
            values.push(Value::Text(kind.as_str().to_string()));
            values.extend(ids.iter().cloned().map(Value::Text));

            if kind == ContentKind::Reply {
                clauses.push(format!("reply_id IN ({})", list));
                values.extend(ids.iter().cloned().map(Value::Text));
            }
        }
        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        self.select_notifications(&clauses.join(" OR "), values)
    }

    pub fn delete_notifications(&self, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let rows = conn.execute(
            &format!("DELETE FROM notifications WHERE id IN ({})", placeholders(ids.len())),
            params_from_iter(ids.iter()),
        )?;
        Ok(rows)
    }

    /// Marks the recipient's notifications read. Fails without writing when any id
    /// is unknown or belongs to someone else.
    pub fn mark_notifications_read(&self, recipient_id: &str, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let list = placeholders(ids.len());
        let mut values = vec![Value::Text(recipient_id.to_string())];
        values.extend(ids.iter().cloned().map(Value::Text));

        let found: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND id IN ({})", list),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        let distinct = ids.iter().collect::<std::collections::HashSet<_>>().len() as i64;
        if found != distinct {
            return Err(StoreError::NotFound("Notification".to_string()));
        }

        let rows = conn.execute(
            &format!("UPDATE notifications SET is_read = 1 WHERE recipient_id = ? AND id IN ({})", list),
            params_from_iter(values.iter()),
        )?;
        Ok(rows)
    }

    fn select_notifications(&self, clause: &str, values: Vec<Value>) -> StoreResult<Vec<Notification>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM notifications WHERE {} ORDER BY created_at DESC, rowid DESC",
            clause
        ))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), NotificationRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Notification::try_from).collect()
    }
}

struct NotificationRow {
    id: String,
    sender_id: String,
    recipient_id: String,
    event: String,
    mention_location_type: Option<ContentKind>,
    mention_location_id: Option<String>,
    repost_type: Option<ContentKind>,
    repost_id: Option<String>,
    reply_id: Option<String>,
    is_read: bool,
    created_at: String,
}

impl NotificationRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            sender_id: row.get("sender_id")?,
            recipient_id: row.get("recipient_id")?,
            event: row.get("event")?,
            mention_location_type: row.get("mention_location_type")?,
            mention_location_id: row.get("mention_location_id")?,
            repost_type: row.get("repost_type")?,
            repost_id: row.get("repost_id")?,
            reply_id: row.get("reply_id")?,
            is_read: row.get("is_read")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let subject = match (
            row.event.as_str(),
            row.mention_location_type,
            row.mention_location_id,
            row.repost_type,
            row.repost_id,
            row.reply_id,
        ) {
            ("mention", Some(kind), Some(id), _, _, _) => NotificationSubject::Mention {
                location: ContentRef::new(kind, id),
            },
            ("repost", _, _, Some(kind), Some(id), _) => NotificationSubject::Repost {
                repost: ContentRef::new(kind, id),
            },
            ("reply", _, _, _, _, Some(reply)) => NotificationSubject::Reply { reply },
            ("follow", ..) => NotificationSubject::Follow,
            (event, ..) => {
                return Err(StoreError::Corrupt(format!(
                    "Notification {} has an incomplete {} payload",
                    row.id, event
                )))
            }
        };
        Ok(Notification {
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            subject,
            is_read: row.is_read,
            created_at: parse_datetime(row.created_at),
        })
    }
}
