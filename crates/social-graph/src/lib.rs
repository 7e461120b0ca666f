//! Social graph for the Fermata trust & moderation subsystem
//!
//! Persistent follow, friendship, and block edges, plus the consistency
//! engine that keeps them coherent: a block between two accounts implies no
//! follow edge and no friendship between them in either direction, enforced
//! transactionally at block-creation time. Follower/following counters are
//! derived values, recomputed from the authoritative edge set rather than
//! incremented, so prior drift self-heals.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blocking;
pub mod relationships;

pub use blocking::{BlockError, BlockRecord, BlockService};
pub use relationships::{
    Friendship, FriendshipState, RelationshipError, RelationshipService,
};
