//! Follow-state between a viewer and a set of other users.

use std::collections::HashMap;

use crate::models::{Follow, Relationship};
use crate::store::{Store, StoreResult};

/// Folds follow edges into one relationship per other party.
///
/// Each edge marks the party that is not the viewer: `FollowsCurrentUser` when
/// the viewer is followed, `FollowedByCurrentUser` when the viewer follows. A
/// second mark from the opposite direction promotes to `FollowEachOther`.
/// Edges that do not touch the viewer are ignored.
pub fn reduce_edges(viewer_id: &str, edges: &[Follow]) -> HashMap<String, Relationship> {
    let mut marks: HashMap<String, Relationship> = HashMap::new();
    for edge in edges {
        let (other, mark) = if edge.followee_id == viewer_id {
            (&edge.follower_id, Relationship::FollowsCurrentUser)
        } else if edge.follower_id == viewer_id {
            (&edge.followee_id, Relationship::FollowedByCurrentUser)
        } else {
            continue;
        };
        if other == viewer_id {
            continue;
        }
        marks
            .entry(other.clone())
            .and_modify(|existing| {
                if *existing != mark {
                    *existing = Relationship::FollowEachOther;
                }
            })
            .or_insert(mark);
    }
    marks
}

/// Relationship of every author towards the viewer, from one edge query.
/// Authors without edges, and the viewer itself, are absent from the map.
pub fn resolve_relationships(
    store: &Store,
    viewer_id: &str,
    author_ids: &[String],
) -> StoreResult<HashMap<String, Relationship>> {
    let others: Vec<String> = author_ids
        .iter()
        .filter(|id| id.as_str() != viewer_id)
        .cloned()
        .collect();
    let edges = store.follow_edges_between(viewer_id, &others)?;
    Ok(reduce_edges(viewer_id, &edges))
}

/// Single-author variant: at most two edges, decided by count.
pub fn resolve_single(store: &Store, viewer_id: &str, user_id: &str) -> StoreResult<Option<Relationship>> {
    if viewer_id == user_id {
        return Ok(None);
    }
    let edges = store.follow_edges_between(viewer_id, &[user_id.to_string()])?;
    Ok(match edges.as_slice() {
        [] => None,
        [edge] if edge.follower_id == user_id => Some(Relationship::FollowsCurrentUser),
        [_] => Some(Relationship::FollowedByCurrentUser),
        _ => Some(Relationship::FollowEachOther),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::user;
    use chrono::Utc;

    fn edge(follower: &str, followee: &str) -> Follow {
        Follow {
            id: format!("{}->{}", follower, followee),
            follower_id: follower.to_string(),
            followee_id: followee.to_string(),
            created_at: Utc::now(),
        }
    }

    fn follow(store: &Store, follower: &str, followee: &str) {
        store.create_follow(&mut edge(follower, followee)).unwrap();
    }

    #[test]
    fn test_reduce_no_edges() {
        assert!(reduce_edges("v", &[]).is_empty());
    }

    #[test]
    fn test_reduce_directions_and_promotion() {
        let marks = reduce_edges(
            "v",
            &[edge("a", "v"), edge("v", "b"), edge("v", "c"), edge("c", "v"), edge("a", "b")],
        );
        assert_eq!(marks.get("a"), Some(&Relationship::FollowsCurrentUser));
        assert_eq!(marks.get("b"), Some(&Relationship::FollowedByCurrentUser));
        assert_eq!(marks.get("c"), Some(&Relationship::FollowEachOther));
        assert_eq!(marks.len(), 3);
    }

    #[test]
    fn test_reduce_is_order_independent() {
        let forward = reduce_edges("v", &[edge("v", "c"), edge("c", "v")]);
        let backward = reduce_edges("v", &[edge("c", "v"), edge("v", "c")]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_self_edge_never_marks_viewer() {
        assert!(reduce_edges("v", &[edge("v", "v")]).is_empty());
    }

    #[test]
    fn test_no_edges_resolves_to_none() {
        let store = Store::in_memory().unwrap();
        let v = user(&store, "v");
        let a = user(&store, "a");
        let b = user(&store, "b");
        let map = resolve_relationships(&store, &v.id, &[a.id.clone(), b.id.clone()]).unwrap();
        assert!(map.is_empty());
        assert_eq!(resolve_single(&store, &v.id, &a.id).unwrap(), None);
    }

    #[test]
    fn test_mutual_follow_is_symmetric() {
        let store = Store::in_memory().unwrap();
        let a = user(&store, "a");
        let b = user(&store, "b");
        follow(&store, &a.id, &b.id);
        follow(&store, &b.id, &a.id);

        let from_a = resolve_relationships(&store, &a.id, &[b.id.clone()]).unwrap();
        let from_b = resolve_relationships(&store, &b.id, &[a.id.clone()]).unwrap();
        assert_eq!(from_a.get(&b.id), Some(&Relationship::FollowEachOther));
        assert_eq!(from_b.get(&a.id), Some(&Relationship::FollowEachOther));
        assert_eq!(resolve_single(&store, &a.id, &b.id).unwrap(), Some(Relationship::FollowEachOther));
    }

    #[test]
    fn test_one_way_follow_reads_differently_per_side() {
        let store = Store::in_memory().unwrap();
        let v = user(&store, "v");
        let a = user(&store, "a");
        follow(&store, &v.id, &a.id);

        let as_v = resolve_relationships(&store, &v.id, &[a.id.clone()]).unwrap();
        let as_a = resolve_relationships(&store, &a.id, &[v.id.clone()]).unwrap();
        assert_eq!(as_v.get(&a.id), Some(&Relationship::FollowedByCurrentUser));
        assert_eq!(as_a.get(&v.id), Some(&Relationship::FollowsCurrentUser));

        assert_eq!(resolve_single(&store, &v.id, &a.id).unwrap(), Some(Relationship::FollowedByCurrentUser));
        assert_eq!(resolve_single(&store, &a.id, &v.id).unwrap(), Some(Relationship::FollowsCurrentUser));
    }

    #[test]
    fn test_viewer_in_author_set_is_skipped() {
        let store = Store::in_memory().unwrap();
        let v = user(&store, "v");
        follow(&store, &v.id, &v.id);
        let map = resolve_relationships(&store, &v.id, &[v.id.clone()]).unwrap();
        assert!(map.is_empty());
        assert_eq!(resolve_single(&store, &v.id, &v.id).unwrap(), None);
    }
}
