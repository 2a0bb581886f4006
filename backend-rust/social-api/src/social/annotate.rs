//! Stamps viewer-relative facts onto populated content.
//!
//! Every list and single-item endpoint goes through [`annotate`]: it gathers
//! the payload ids and author ids across the whole page, asks each resolver
//! once, then writes `isLiked`/`isReposted`/`isBookmarked` and
//! `author.relationship` onto every payload. Entries with nothing populated
//! are left alone.

use std::collections::HashSet;

use super::engagement::resolve_engagement;
use super::relationships::resolve_relationships;
use crate::models::*;
use crate::store::{Store, StoreResult};

/// An entry holding zero or more embedded content payloads under role keys.
pub trait Annotatable {
    fn payloads(&self) -> Vec<&ContentView>;
    fn payloads_mut(&mut self) -> Vec<&mut ContentView>;
}

impl Annotatable for ContentView {
    fn payloads(&self) -> Vec<&ContentView> {
        vec![self]
    }

    fn payloads_mut(&mut self) -> Vec<&mut ContentView> {
        vec![self]
    }
}

impl Annotatable for ThreadView {
    fn payloads(&self) -> Vec<&ContentView> {
        [&self.post, &self.reply, &self.repost].into_iter().flatten().collect()
    }

    fn payloads_mut(&mut self) -> Vec<&mut ContentView> {
        [&mut self.post, &mut self.reply, &mut self.repost]
            .into_iter()
            .flatten()
            .collect()
    }
}

impl Annotatable for NotificationView {
    fn payloads(&self) -> Vec<&ContentView> {
        [&self.mention_location, &self.repost, &self.reply]
            .into_iter()
            .flatten()
            .collect()
    }

    fn payloads_mut(&mut self) -> Vec<&mut ContentView> {
        [&mut self.mention_location, &mut self.repost, &mut self.reply]
            .into_iter()
            .flatten()
            .collect()
    }
}

impl Annotatable for BookmarkView {
    fn payloads(&self) -> Vec<&ContentView> {
        self.target.iter().collect()
    }

    fn payloads_mut(&mut self) -> Vec<&mut ContentView> {
        self.target.iter_mut().collect()
    }
}

impl Annotatable for LikeView {
    fn payloads(&self) -> Vec<&ContentView> {
        self.target.iter().collect()
    }

    fn payloads_mut(&mut self) -> Vec<&mut ContentView> {
        self.target.iter_mut().collect()
    }
}

/// Annotates every payload of every entry for `viewer_id`.
pub fn annotate<T: Annotatable>(store: &Store, viewer_id: &str, entries: &mut [T]) -> StoreResult<()> {
    let mut content_ids = Vec::new();
    let mut author_ids = Vec::new();
    let mut seen_content = HashSet::new();
    let mut seen_authors = HashSet::new();
    for payload in entries.iter().flat_map(|e| e.payloads()) {
        if seen_content.insert(payload.id()) {
            content_ids.push(payload.id().to_string());
        }
        if seen_authors.insert(payload.author_id()) {
            author_ids.push(payload.author_id().to_string());
        }
    }
    if content_ids.is_empty() {
        return Ok(());
    }

    let engagement = resolve_engagement(store, viewer_id, &content_ids)?;
    let relationships = resolve_relationships(store, viewer_id, &author_ids)?;

    for payload in entries.iter_mut().flat_map(|e| e.payloads_mut()) {
        let id = payload.id().to_string();
        payload.is_liked = engagement.is_liked(&id);
        payload.is_reposted = engagement.is_reposted(&id);
        payload.is_bookmarked = engagement.is_bookmarked(&id);
        payload.author.relationship = relationships.get(payload.author_id()).copied();
    }
    Ok(())
}

/// Users as seen by the viewer, in the given order.
pub fn annotate_users(store: &Store, viewer_id: &str, users: Vec<User>) -> StoreResult<Vec<AuthorView>> {
    let ids: Vec<String> = users.iter().map(|u| u.id.clone()).collect();
    let relationships = resolve_relationships(store, viewer_id, &ids)?;
    Ok(users
        .into_iter()
        .map(|user| {
            let relationship = relationships.get(&user.id).copied();
            AuthorView { user, relationship }
        })
        .collect())
}
