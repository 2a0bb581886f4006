//! Real-time delivery
//!
//! Every connected client joins the room of its user. Delivery to a room is a
//! fan-out to the connections present at that moment; there is no queue, so an
//! offline user simply misses the event.
//!
//! Rooms are `tokio::sync::broadcast` channels keyed by user id. A room with no
//! receivers left is pruned on the next join.

use futures_util::Stream;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::models::{Message, NotificationView};

const ROOM_CAPACITY: usize = 64;

/// Payloads pushed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RealtimeEvent {
    Session {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    PrivateMessage {
        message: Message,
    },
    Notification {
        notification: NotificationView,
    },
    NotificationRemoved {
        id: String,
    },
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::Session { .. } => "session",
            RealtimeEvent::PrivateMessage { .. } => "privateMessage",
            RealtimeEvent::Notification { .. } => "notification",
            RealtimeEvent::NotificationRemoved { .. } => "notificationRemoved",
        }
    }

    /// One server-sent-events frame.
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        Ok(format!("event: {}\ndata: {}\n\n", self.name(), serde_json::to_string(self)?))
    }
}

/// A client joined to its user's room.
pub struct RoomConnection {
    pub session_id: String,
    pub user_id: String,
    receiver: broadcast::Receiver<RealtimeEvent>,
}

impl RoomConnection {
    /// The session greeting followed by every event delivered to the room.
    pub fn into_stream(self) -> impl Stream<Item = RealtimeEvent> {
        let greeting = RealtimeEvent::Session {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
        };
        let session_id = self.session_id;
        let events = BroadcastStream::new(self.receiver).filter_map(move |item| match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                log::warn!("Realtime session {} lagged, {} events dropped", session_id, skipped);
                None
            }
        });
        tokio_stream::once(greeting).chain(events)
    }

    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Registry of per-user rooms.
pub struct RoomHub {
    rooms: Mutex<HashMap<String, broadcast::Sender<RealtimeEvent>>>,
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomHub {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Adds a connection with a fresh session id to the user's room.
    pub fn join_room(&self, user_id: &str) -> RoomConnection {
        let mut rooms = self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rooms.retain(|_, sender| sender.receiver_count() > 0);
        let receiver = rooms
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe();

        let session_id = Uuid::new_v4().to_string();
        log::debug!("Session {} joined room {}", session_id, user_id);
        RoomConnection {
            session_id,
            user_id: user_id.to_string(),
            receiver,
        }
    }

    /// Delivers to every connection currently in the room. Returns how many
    /// received it; zero when the user is offline.
    pub fn send_to_room(&self, user_id: &str, event: RealtimeEvent) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(sender) = rooms.get(user_id) else {
            log::debug!("No connections in room {} for {}", user_id, event.name());
            return 0;
        };
        match sender.send(event) {
            Ok(count) => count,
            Err(e) => {
                log::debug!("Room {} has no receivers for {}", user_id, e.0.name());
                0
            }
        }
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rooms.get(user_id).map(|s| s.receiver_count()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rooms.len()
    }
}
