//! Report intake and resolution for the Fermata trust & moderation subsystem
//!
//! This crate handles report intake and routing (validation, duplicate
//! guards, least-loaded assignment to admins) and the resolution state
//! machine that closes a report and dispatches its side effects (content
//! removal, suspension, ban).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod content;
pub mod reporting;
pub mod resolution;

pub use content::{ContentStore, ContentStoreError, ContentType};
pub use reporting::{Priority, Report, ReportError, ReportReason, ReportRouter, ReportStatus};
pub use resolution::{
    ResolutionAction, ResolutionEngine, ResolutionError, ResolveOutcome, SideEffect,
};
