//! Deleting a post or reply together with everything that depends on it.
//!
//! The closure (root plus every reply whose `links` contain the root id) is
//! computed before any row is removed. Dependents go first and the root last,
//! each as its own statement. Counters that summarize the closure are
//! recomputed before the root is removed, so an interrupted run either leaves
//! the root in place to be run again or has already settled every counter.

use std::collections::BTreeSet;

use super::counters::{recount, recount_replies_without, Counter};
use crate::models::{ContentItem, ContentKind, ContentRef, Notification};
use crate::store::{Store, StoreError, StoreResult};

/// What a cascade removed.
#[derive(Debug, Default)]
pub struct CascadeOutcome {
    pub root_deleted: bool,
    pub deleted_replies: Vec<String>,
    /// Notifications that pointed into the closure, already deleted.
    pub removed_notifications: Vec<Notification>,
    /// Users whose post count was recomputed.
    pub touched_users: Vec<String>,
}

impl CascadeOutcome {
    /// Distinct recipients of the removed notifications.
    pub fn notification_recipients(&self) -> Vec<String> {
        self.removed_notifications
            .iter()
            .map(|n| n.recipient_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Deletes `root` and its dependents. An absent root with no remaining
/// descendants is a no-op.
pub fn delete_content_cascade(store: &Store, root: &ContentRef) -> StoreResult<CascadeOutcome> {
    let root_item = match store.get_content(root) {
        Ok(item) => Some(item),
        Err(StoreError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let descendants = store.replies_descending_from(&root.id)?;
    if root_item.is_none() && descendants.is_empty() {
        return Ok(CascadeOutcome::default());
    }

    let mut touched: BTreeSet<String> = descendants.iter().map(|(_, author)| author.clone()).collect();
    if let Some(item) = &root_item {
        touched.insert(item.author_id().to_string());
    }

    let reply_ids: Vec<String> = descendants.into_iter().map(|(id, _)| id).collect();
    let mut closure: Vec<ContentRef> = reply_ids.iter().map(ContentRef::reply).collect();
    closure.push(root.clone());

    let removed_notifications = store.notifications_referencing(&closure)?;
    let notification_ids: Vec<String> = removed_notifications.iter().map(|n| n.id.clone()).collect();

    store.delete_bookmarks_for(&closure)?;
    store.delete_likes_for(&closure)?;
    touched.extend(store.delete_threads_for(&closure)?);
    store.delete_notifications(&notification_ids)?;

    // Post counts depend only on timeline entries, which are gone by now.
    for user_id in &touched {
        recount(store, &Counter::Posts(user_id.clone()))?;
    }
    store.delete_replies(&reply_ids)?;

    let root_deleted = match root.kind {
        ContentKind::Post => {
            store.detach_hashtags_from_posts(std::slice::from_ref(&root.id))?;
            store.delete_post(&root.id)? > 0
        }
        ContentKind::Reply => {
            if let Some(ContentItem::Reply(reply)) = &root_item {
                recount_replies_without(store, &reply.target, &root.id)?;
            }
            store.delete_replies(std::slice::from_ref(&root.id))? > 0
        }
    };

    log::info!(
        "Cascade delete of {} {}: {} replies, {} notifications, {} users recounted",
        root.kind,
        root.id,
        reply_ids.len(),
        removed_notifications.len(),
        touched.len()
    );

    Ok(CascadeOutcome {
        root_deleted,
        deleted_replies: reply_ids,
        removed_notifications,
        touched_users: touched.into_iter().collect(),
    })
}
