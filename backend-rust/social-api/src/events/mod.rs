//! Notification Fan-out Module
//!
//! Notifications are created by the action that triggers them (follow, repost,
//! reply, mention) and removed when that action is undone or the content they
//! point at is deleted.
//!
//! Flow: persist -> populate for the recipient -> push to the recipient's room
//!
//! Real-time delivery is best effort. A recipient with no open connection
//! still finds the notification in their list.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::*;
use crate::realtime::{RealtimeEvent, RoomHub};
use crate::social::annotate;
use crate::store::{Store, StoreResult};

/// Persists notifications and pushes them to connected recipients.
pub struct EventProcessor {
    store: Arc<Store>,
    hub: Arc<RoomHub>,
}

impl EventProcessor {
    pub fn new(store: Arc<Store>, hub: Arc<RoomHub>) -> Self {
        Self { store, hub }
    }

    /// Store a notification and deliver it to the recipient's room.
    pub fn notify(&self, mut notif: Notification) -> StoreResult<Notification> {
        self.store.create_notification(&mut notif)?;
        self.push_notification(&notif)?;
        Ok(notif)
    }

    pub fn notify_all(&self, notifs: Vec<Notification>) -> StoreResult<Vec<Notification>> {
        notifs.into_iter().map(|n| self.notify(n)).collect()
    }

    /// Delete notifications and tell their recipients.
    pub fn retract(&self, notifs: &[Notification]) -> StoreResult<usize> {
        if notifs.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = notifs.iter().map(|n| n.id.clone()).collect();
        let removed = self.store.delete_notifications(&ids)?;
        self.announce_removed(notifs);
        Ok(removed)
    }

    /// Push removal events for notifications that are already gone.
    pub fn announce_removed(&self, notifs: &[Notification]) {
        for notif in notifs {
            self.hub.send_to_room(
                &notif.recipient_id,
                RealtimeEvent::NotificationRemoved { id: notif.id.clone() },
            );
        }
    }

    /// Push a new direct message to the recipient and to the sender's own
    /// connections. Returns the number of connections reached.
    pub fn deliver_message(&self, message: &Message) -> usize {
        let mut delivered = self.hub.send_to_room(
            &message.to_id,
            RealtimeEvent::PrivateMessage { message: message.clone() },
        );
        if message.from_id != message.to_id {
            delivered += self.hub.send_to_room(
                &message.from_id,
                RealtimeEvent::PrivateMessage { message: message.clone() },
            );
        }
        log::debug!("Message {} reached {} connections", message.id, delivered);
        delivered
    }

    fn push_notification(&self, notif: &Notification) -> StoreResult<()> {
        if self.hub.connection_count(&notif.recipient_id) == 0 {
            return Ok(());
        }
        let mut views = self.store.notification_views(vec![notif.clone()])?;
        annotate(&self.store, &notif.recipient_id, &mut views)?;
        if let Some(view) = views.pop() {
            self.hub.send_to_room(&notif.recipient_id, RealtimeEvent::Notification { notification: view });
        }
        Ok(())
    }
}

fn notification(sender_id: &str, recipient_id: &str, subject: NotificationSubject) -> Notification {
    Notification {
        id: String::new(),
        sender_id: sender_id.to_string(),
        recipient_id: recipient_id.to_string(),
        subject,
        is_read: false,
        created_at: Utc::now(),
    }
}

/// `follower_id` started following `followee_id`.
pub fn follow_notification(follower_id: &str, followee_id: &str) -> Notification {
    notification(follower_id, followee_id, NotificationSubject::Follow)
}

/// `reposter_id` reposted content written by `author_id`.
pub fn repost_notification(reposter_id: &str, author_id: &str, repost: ContentRef) -> Notification {
    notification(reposter_id, author_id, NotificationSubject::Repost { repost })
}

/// `replier_id` replied to content written by `target_author_id`.
pub fn reply_notification(replier_id: &str, target_author_id: &str, reply_id: &str) -> Notification {
    notification(
        replier_id,
        target_author_id,
        NotificationSubject::Reply { reply: reply_id.to_string() },
    )
}

/// One mention per distinct target, never to the sender.
pub fn mention_notifications(sender_id: &str, location: &ContentRef, targets: &[String]) -> Vec<Notification> {
    let mut seen = HashSet::new();
    targets
        .iter()
        .filter(|t| t.as_str() != sender_id && seen.insert(t.as_str()))
        .map(|t| {
            notification(
                sender_id,
                t,
                NotificationSubject::Mention { location: location.clone() },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::user;

    fn processor() -> (EventProcessor, Arc<Store>, Arc<RoomHub>) {
        let store = Arc::new(Store::in_memory().unwrap());
        let hub = Arc::new(RoomHub::new());
        (EventProcessor::new(store.clone(), hub.clone()), store, hub)
    }

    #[test]
    fn test_follow_notification() {
        let notif = follow_notification("user1", "user2");
        assert_eq!(notif.sender_id, "user1");
        assert_eq!(notif.recipient_id, "user2");
        assert_eq!(notif.subject.event(), NotificationEvent::Follow);
    }

    #[test]
    fn test_mention_notifications_skip_sender_and_duplicates() {
        let location = ContentRef::post("p1");
        let targets = vec!["u1".to_string(), "u2".to_string(), "u2".to_string(), "me".to_string()];
        let notifs = mention_notifications("me", &location, &targets);
        let recipients: Vec<&str> = notifs.iter().map(|n| n.recipient_id.as_str()).collect();
        assert_eq!(recipients, vec!["u1", "u2"]);
        assert_eq!(notifs[0].subject.content_ref(), Some(location));
    }

    #[tokio::test]
    async fn test_notify_persists_without_listeners() {
        let (events, store, _hub) = processor();
        let a = user(&store, "a");
        let b = user(&store, "b");

        let notif = events.notify(follow_notification(&a.id, &b.id)).unwrap();
        assert!(!notif.id.is_empty());
        let (listed, count) = store.list_notifications(&b.id, &Pagination::default()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(listed[0].id, notif.id);
    }

    #[tokio::test]
    async fn test_notify_pushes_to_recipient_room() {
        let (events, store, hub) = processor();
        let a = user(&store, "a");
        let b = user(&store, "b");
        let mut conn = hub.join_room(&b.id);

        let notif = events.notify(follow_notification(&a.id, &b.id)).unwrap();
        match conn.recv().await {
            Some(RealtimeEvent::Notification { notification }) => {
                assert_eq!(notification.id, notif.id);
                assert_eq!(notification.sender.map(|s| s.id), Some(a.id.clone()));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        events.retract(&[notif.clone()]).unwrap();
        assert!(matches!(conn.recv().await, Some(RealtimeEvent::NotificationRemoved { id }) if id == notif.id));
        let (_, count) = store.list_notifications(&b.id, &Pagination::default()).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_message_reaches_both_parties() {
        let (events, _store, hub) = processor();
        let mut to = hub.join_room("u2");
        let _from = hub.join_room("u1");
        let message = Message {
            id: "m1".to_string(),
            from_id: "u1".to_string(),
            to_id: "u2".to_string(),
            content: "hi".to_string(),
            is_read: false,
            created_at: Utc::now(),
        };
        assert_eq!(events.deliver_message(&message), 2);
        assert!(matches!(to.recv().await, Some(RealtimeEvent::PrivateMessage { .. })));
    }
}
