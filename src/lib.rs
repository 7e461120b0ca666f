//! Fermata trust & moderation subsystem
//!
//! Umbrella crate for embedders: re-exports the subsystem's services and
//! models from the member crates. The end-to-end tests in `tests/` exercise
//! the full stack through these types.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use accounts::{
    Account, AdminDirectory, Capability, ConductAction, ConductEntry, Role, StandingError,
    StandingService,
};
pub use moderation::{
    ContentStore, ContentStoreError, ContentType, Priority, Report, ReportError, ReportReason,
    ReportRouter, ReportStatus, ResolutionAction, ResolutionEngine, ResolutionError,
    ResolveOutcome, SideEffect,
};
pub use notifications::{Notification, NotificationKind, NotificationService, ResourceRef};
pub use social_graph::{
    BlockError, BlockRecord, BlockService, Friendship, FriendshipState, RelationshipError,
    RelationshipService,
};
pub use storage::{DatabaseConfig, ErrorKind, SqliteDatabase};
