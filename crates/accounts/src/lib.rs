//! Account standing for the Fermata trust & moderation subsystem
//!
//! This crate owns the account model and everything that changes an
//! account's standing: suspensions, bans, the conduct-lives counter, lazy
//! suspension expiry at login, and reactivation. It also carries the
//! role/capability table used by the moderation services and the admin
//! directory the report router balances caseloads against.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod account;
pub mod directory;
pub mod roles;
pub mod standing;

pub use account::Account;
pub use directory::{AdminDirectory, AdminSummary};
pub use roles::{Capability, Role};
pub use standing::{ConductAction, ConductEntry, StandingError, StandingService};
