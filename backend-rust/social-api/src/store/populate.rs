use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

use super::content::{posts_by_ids, replies_by_ids, split_by_kind};
use super::users::users_by_ids;
use super::{Store, StoreResult};
use crate::models::*;

impl Store {
    // ==================== Population ====================

    /// Materializes referenced content with its author. Replies also carry their
    /// direct parent, one level deep. Missing references are absent from the map.
    pub fn content_views(&self, refs: &[ContentRef]) -> StoreResult<HashMap<ContentRef, ContentView>> {
        if refs.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.lock()?;

        let items = load_items(&conn, refs)?;
        let parent_refs: Vec<ContentRef> = items
            .iter()
            .filter_map(|item| match item {
                ContentItem::Reply(reply) => Some(reply.target.clone()),
                ContentItem::Post(_) => None,
            })
            .collect();
        let parents = load_items(&conn, &parent_refs)?;

        let author_ids = distinct(items.iter().chain(parents.iter()).map(|i| i.author_id().to_string()));
        let authors = users_by_ids(&conn, &author_ids, true)?;

        let parent_views: HashMap<ContentRef, ContentView> = parents
            .into_iter()
            .filter_map(|item| {
                let author = authors.get(item.author_id())?.clone();
                Some((item.content_ref(), ContentView::new(item, author)))
            })
            .collect();

        let mut views = HashMap::new();
        for item in items {
            let author = match authors.get(item.author_id()) {
                Some(author) => author.clone(),
                None => continue,
            };
            let parent = match &item {
                ContentItem::Reply(reply) => parent_views.get(&reply.target).cloned().map(Box::new),
                ContentItem::Post(_) => None,
            };
            let key = item.content_ref();
            let mut view = ContentView::new(item, author);
            view.parent = parent;
            views.insert(key, view);
        }
        Ok(views)
    }

    /// Single content view, or `None` when the item is gone.
    pub fn content_view(&self, target: &ContentRef) -> StoreResult<Option<ContentView>> {
        Ok(self.content_views(std::slice::from_ref(target))?.remove(target))
    }

    pub fn thread_views(&self, threads: Vec<UserThread>) -> StoreResult<Vec<ThreadView>> {
        let refs: Vec<ContentRef> = threads.iter().map(|t| t.activity.content_ref()).collect();
        let content = self.content_views(&refs)?;
        let users = self.users_including_deleted(threads.iter().map(|t| t.user_id.clone()))?;

        let mut views = Vec::with_capacity(threads.len());
        for thread in threads {
            let user = match users.get(&thread.user_id) {
                Some(user) => user.clone(),
                None => continue,
            };
            let target = thread.activity.content_ref();
            // Reposts may share one item, so clone rather than take.
            let payload = content.get(&target).cloned();
            let mut view = ThreadView {
                id: thread.id,
                user,
                post: None,
                reply: None,
                repost_type: None,
                repost: None,
                created_at: thread.created_at,
            };
            match thread.activity {
                ThreadActivity::Post { .. } => view.post = payload,
                ThreadActivity::Reply { .. } => view.reply = payload,
                ThreadActivity::Repost { repost } => {
                    view.repost_type = Some(repost.kind);
                    view.repost = payload;
                }
            }
            views.push(view);
        }
        Ok(views)
    }

    pub fn notification_views(&self, notifs: Vec<Notification>) -> StoreResult<Vec<NotificationView>> {
        let refs: Vec<ContentRef> = notifs.iter().filter_map(|n| n.subject.content_ref()).collect();
        let content = self.content_views(&refs)?;
        let senders = self.users_including_deleted(notifs.iter().map(|n| n.sender_id.clone()))?;

        Ok(notifs
            .into_iter()
            .map(|notif| {
                let payload = notif.subject.content_ref().and_then(|r| content.get(&r).cloned());
                let mut view = NotificationView {
                    id: notif.id,
                    sender: senders.get(&notif.sender_id).cloned(),
                    recipient_id: notif.recipient_id,
                    event: notif.subject.event(),
                    mention_location_type: None,
                    mention_location: None,
                    repost_type: None,
                    repost: None,
                    reply: None,
                    is_read: notif.is_read,
                    created_at: notif.created_at,
                };
                match notif.subject {
                    NotificationSubject::Mention { location } => {
                        view.mention_location_type = Some(location.kind);
                        view.mention_location = payload;
                    }
                    NotificationSubject::Repost { repost } => {
                        view.repost_type = Some(repost.kind);
                        view.repost = payload;
                    }
                    NotificationSubject::Reply { .. } => view.reply = payload,
                    NotificationSubject::Follow => {}
                }
                view
            })
            .collect())
    }

    pub fn bookmark_views(&self, bookmarks: Vec<Bookmark>) -> StoreResult<Vec<BookmarkView>> {
        let refs: Vec<ContentRef> = bookmarks.iter().map(|b| b.target.clone()).collect();
        let content = self.content_views(&refs)?;
        Ok(bookmarks
            .into_iter()
            .map(|b| BookmarkView {
                target: content.get(&b.target).cloned(),
                id: b.id,
                user_id: b.user_id,
                target_type: b.target.kind,
                created_at: b.created_at,
            })
            .collect())
    }

    pub fn like_views(&self, likes: Vec<Like>) -> StoreResult<Vec<LikeView>> {
        let refs: Vec<ContentRef> = likes.iter().map(|l| l.target.clone()).collect();
        let content = self.content_views(&refs)?;
        Ok(likes
            .into_iter()
            .map(|l| LikeView {
                target: content.get(&l.target).cloned(),
                id: l.id,
                author_id: l.author_id,
                target_type: l.target.kind,
                created_at: l.created_at,
            })
            .collect())
    }

    fn users_including_deleted(&self, ids: impl Iterator<Item = String>) -> StoreResult<HashMap<String, User>> {
        let ids = distinct(ids);
        let conn = self.lock()?;
        users_by_ids(&conn, &ids, true)
    }
}

fn load_items(conn: &Connection, refs: &[ContentRef]) -> StoreResult<Vec<ContentItem>> {
    let [(_, post_ids), (_, reply_ids)] = split_by_kind(refs);
    let posts = posts_by_ids(conn, &distinct(post_ids.into_iter()))?;
    let replies = replies_by_ids(conn, &distinct(reply_ids.into_iter()))?;
    Ok(posts
        .into_values()
        .map(ContentItem::Post)
        .chain(replies.into_values().map(ContentItem::Reply))
        .collect())
}

fn distinct(ids: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(id.clone())).collect()
}
