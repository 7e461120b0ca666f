//! Roles and capabilities
//!
//! The platform has exactly three roles. Every "is the caller allowed to do
//! this" decision in the subsystem goes through [`Role::can`] so the policy
//! lives in one match instead of scattered conditionals per handler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular account
    User,
    /// Moderator carrying a report caseload
    Admin,
    /// Supervising moderator; reassigns caseloads, carries none
    SuperAdmin,
}

/// Parse error for [`Role`]
#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl Role {
    /// Stable string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Whether this role is moderation staff
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    /// Capability table: the single source of truth for role checks
    pub fn can(&self, capability: Capability) -> bool {
        match self {
            Role::User => matches!(capability, Capability::SubmitReport),
            Role::Admin => !matches!(capability, Capability::ReassignReports),
            Role::SuperAdmin => true,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation a role may or may not perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// File a report against content or an account
    SubmitReport,
    /// Open, resolve, or reject assigned reports
    ReviewReports,
    /// Move a report onto a different moderator's caseload
    ReassignReports,
    /// Change a report's priority without a status transition
    ChangePriority,
    /// Suspend or ban reported users
    ModerateUsers,
    /// Grant, reset, or deduct conduct lives
    AdjustLives,
    /// Clear suspensions and bans by override
    Reactivate,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::SubmitReport => "submit_report",
            Capability::ReviewReports => "review_reports",
            Capability::ReassignReports => "reassign_reports",
            Capability::ChangePriority => "change_priority",
            Capability::ModerateUsers => "moderate_users",
            Capability::AdjustLives => "adjust_lives",
            Capability::Reactivate => "reactivate",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
        assert!(Role::from_str("moderator").is_err());
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"super_admin\"");
        assert_eq!(serde_json::from_str::<Role>("\"admin\"").unwrap(), Role::Admin);
    }

    #[test]
    fn test_user_capabilities() {
        assert!(Role::User.can(Capability::SubmitReport));
        assert!(!Role::User.can(Capability::ReviewReports));
        assert!(!Role::User.can(Capability::ModerateUsers));
        assert!(!Role::User.can(Capability::ReassignReports));
    }

    #[test]
    fn test_admin_capabilities() {
        assert!(Role::Admin.can(Capability::SubmitReport));
        assert!(Role::Admin.can(Capability::ReviewReports));
        assert!(Role::Admin.can(Capability::ChangePriority));
        assert!(Role::Admin.can(Capability::ModerateUsers));
        assert!(Role::Admin.can(Capability::AdjustLives));
        assert!(Role::Admin.can(Capability::Reactivate));
        // Reassignment is supervision, not caseload work.
        assert!(!Role::Admin.can(Capability::ReassignReports));
    }

    #[test]
    fn test_super_admin_capabilities() {
        for capability in [
            Capability::SubmitReport,
            Capability::ReviewReports,
            Capability::ReassignReports,
            Capability::ChangePriority,
            Capability::ModerateUsers,
            Capability::AdjustLives,
            Capability::Reactivate,
        ] {
            assert!(Role::SuperAdmin.can(capability));
        }
    }

    #[test]
    fn test_is_staff() {
        assert!(!Role::User.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(Role::SuperAdmin.is_staff());
    }
}
