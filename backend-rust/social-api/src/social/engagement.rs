use std::collections::HashSet;

use crate::store::{Store, StoreResult};

/// The viewer's likes, reposts and bookmarks among a set of content ids.
#[derive(Debug, Default, Clone)]
pub struct EngagementSet {
    pub liked: HashSet<String>,
    pub reposted: HashSet<String>,
    pub bookmarked: HashSet<String>,
}

impl EngagementSet {
    pub fn is_liked(&self, id: &str) -> bool {
        self.liked.contains(id)
    }

    pub fn is_reposted(&self, id: &str) -> bool {
        self.reposted.contains(id)
    }

    pub fn is_bookmarked(&self, id: &str) -> bool {
        self.bookmarked.contains(id)
    }
}

/// One query per edge kind, regardless of how many ids are asked about.
/// Reposts are read from the viewer's timeline entries.
pub fn resolve_engagement(store: &Store, viewer_id: &str, target_ids: &[String]) -> StoreResult<EngagementSet> {
    if target_ids.is_empty() {
        return Ok(EngagementSet::default());
    }
    Ok(EngagementSet {
        liked: store.liked_ids(viewer_id, target_ids)?,
        reposted: store.reposted_ids(viewer_id, target_ids)?,
        bookmarked: store.bookmarked_ids(viewer_id, target_ids)?,
    })
}
