//! Viewer annotation and counter maintenance shared by every endpoint.

mod annotate;
mod cascade;
mod counters;
mod engagement;
mod relationships;

pub use annotate::{annotate, annotate_users, Annotatable};
pub use cascade::{delete_content_cascade, CascadeOutcome};
pub use counters::{bump_view_counts, recount, recount_all, recount_content, recount_follow, Counter};
pub use engagement::{resolve_engagement, EngagementSet};
pub use relationships::{reduce_edges, resolve_relationships, resolve_single};
