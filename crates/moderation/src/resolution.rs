//! Report resolution
//!
//! The state machine that closes a report:
//! `pending → in_review → {resolved, rejected}`, terminal states final.
//! Resolving dispatches the chosen enforcement action; rejection is its own
//! explicit decision, never inferred from a "no action" resolution.
//!
//! Every validation and invariant check runs before any mutation. The
//! resolution record itself is committed first and side effects dispatch
//! afterwards: a failed downstream action (content deletion, suspension)
//! is a degraded success that is logged and surfaced in the outcome, never
//! a rollback of the moderator's recorded decision.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

use accounts::{Account, Capability, Role, StandingError, StandingService};
use notifications::{NotificationKind, NotificationService, ResourceRef};
use storage::ErrorKind;

use crate::content::{ContentStore, ContentStoreError, ContentType};
use crate::reporting::{Report, ReportStatus};

/// Errors from resolution operations
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// No report with that id
    #[error("Report not found: {0}")]
    ReportNotFound(i64),

    /// No account with that id
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    /// The report already reached a terminal status
    #[error("Report {0} is already resolved")]
    AlreadyResolved(i64),

    /// Only the assigned admin or a super admin may act on a report
    #[error("Only the assigned admin or a super admin can act on this report")]
    NotAssignedModerator,

    /// The requested transition is not legal from the current status
    #[error("Cannot open review from status '{from}'")]
    InvalidTransition {
        /// Status the report was in
        from: ReportStatus,
    },

    /// User-targeted actions require a report about a user
    #[error("Action requires a user report, got '{content_type}'")]
    WrongContentType {
        /// Content type of the report
        content_type: ContentType,
    },

    /// Admin immunity: the target is moderation staff
    #[error("Moderation actions cannot target admin accounts")]
    CannotModerateAdmin,

    /// The reported content no longer exists
    #[error("Content not found: {0} {1}")]
    ContentNotFound(ContentType, i64),

    /// The content collaborator failed during pre-validation
    #[error("Content store unavailable: {0}")]
    ContentStore(String),

    /// Storage failure
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl ResolutionError {
    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolutionError::ReportNotFound(_) => ErrorKind::NotFound,
            ResolutionError::AccountNotFound(_) => ErrorKind::NotFound,
            ResolutionError::AlreadyResolved(_) => ErrorKind::Conflict,
            ResolutionError::NotAssignedModerator => ErrorKind::Forbidden,
            ResolutionError::InvalidTransition { .. } => ErrorKind::Conflict,
            ResolutionError::WrongContentType { .. } => ErrorKind::PolicyViolation,
            ResolutionError::CannotModerateAdmin => ErrorKind::Forbidden,
            ResolutionError::ContentNotFound(_, _) => ErrorKind::NotFound,
            ResolutionError::ContentStore(_) => ErrorKind::Internal,
            ResolutionError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, ResolutionError>;

/// Enforcement action recorded with a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResolutionAction {
    /// Close with no enforcement
    #[serde(rename = "none")]
    NoAction,
    /// Record a formal warning against the reported user
    Warning,
    /// Hard-delete the reported content and notify its owners
    RemoveContent,
    /// Suspend the reported user (`days = 0` means indefinite)
    SuspendUser {
        /// Suspension length in days
        days: u32,
    },
    /// Ban the reported user
    BanUser,
}

impl ResolutionAction {
    /// Stable string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionAction::NoAction => "none",
            ResolutionAction::Warning => "warning",
            ResolutionAction::RemoveContent => "remove_content",
            ResolutionAction::SuspendUser { .. } => "suspend_user",
            ResolutionAction::BanUser => "ban_user",
        }
    }
}

/// What happened to the side effect of a resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SideEffect {
    /// The action had no side effect to dispatch
    NotRequired,
    /// The side effect completed
    Applied,
    /// The side effect failed after the resolution was recorded
    ///
    /// The resolution stands; the detail is for the retry done out of band.
    Failed {
        /// Human-readable failure detail
        detail: String,
    },
}

/// A resolved report together with its side-effect outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOutcome {
    /// The report after resolution
    pub report: Report,
    /// What happened downstream
    pub side_effect: SideEffect,
}

/// Data gathered during pre-validation, before any mutation
enum PreparedAction {
    Nothing,
    WarnUser { target_id: i64 },
    RemoveContent { owners: Vec<i64> },
    SuspendUser { target_id: i64, days: u32 },
    BanUser { target_id: i64 },
}

/// Resolution engine
pub struct ResolutionEngine {
    pool: SqlitePool,
    content: Arc<dyn ContentStore>,
    standing: StandingService,
    notifications: NotificationService,
}

impl ResolutionEngine {
    /// Create a new resolution engine over the shared pool and collaborators
    pub fn new(pool: SqlitePool, content: Arc<dyn ContentStore>) -> Self {
        let standing = StandingService::new(pool.clone());
        let notifications = NotificationService::new(pool.clone());
        Self {
            pool,
            content,
            standing,
            notifications,
        }
    }

    async fn get_report(&self, report_id: i64) -> Result<Report> {
        let row = sqlx::query("SELECT * FROM reports WHERE id = ?")
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ResolutionError::ReportNotFound(report_id))?;
        Ok(Report::from_row(&row)?)
    }

    async fn get_caller(&self, caller_id: i64) -> Result<Account> {
        Account::fetch(&self.pool, caller_id)
            .await?
            .ok_or(ResolutionError::AccountNotFound(caller_id))
    }

    /// Assigned admin or super admin; everyone else is turned away
    fn authorize(report: &Report, caller: &Account) -> Result<()> {
        if !caller.role.can(Capability::ReviewReports) {
            return Err(ResolutionError::NotAssignedModerator);
        }
        match caller.role {
            Role::SuperAdmin => Ok(()),
            _ if report.assigned_admin_id == Some(caller.id) => Ok(()),
            _ => Err(ResolutionError::NotAssignedModerator),
        }
    }

    /// Open review on a pending report
    pub async fn open_review(&self, report_id: i64, admin_id: i64) -> Result<Report> {
        let report = self.get_report(report_id).await?;
        let caller = self.get_caller(admin_id).await?;
        Self::authorize(&report, &caller)?;

        match report.status {
            ReportStatus::Pending => {}
            ReportStatus::InReview => {
                return Err(ResolutionError::InvalidTransition {
                    from: report.status,
                })
            }
            _ => return Err(ResolutionError::AlreadyResolved(report_id)),
        }

        sqlx::query(
            "UPDATE reports SET status = 'in_review', updated_at = ?
              WHERE id = ? AND status = 'pending'",
        )
        .bind(Utc::now())
        .bind(report_id)
        .execute(&self.pool)
        .await?;

        self.get_report(report_id).await
    }

    /// Resolve a report with an enforcement action
    ///
    /// All checks happen before any write. The resolution record commits
    /// first; the side effect dispatches afterwards, and a failure there is
    /// reported as [`SideEffect::Failed`] in an otherwise successful
    /// outcome. The moderator's decision is never rolled back.
    pub async fn resolve(
        &self,
        report_id: i64,
        action: ResolutionAction,
        note: &str,
        resolver_id: i64,
    ) -> Result<ResolveOutcome> {
        let report = self.get_report(report_id).await?;
        if !report.status.is_active() {
            return Err(ResolutionError::AlreadyResolved(report_id));
        }
        let resolver = self.get_caller(resolver_id).await?;
        Self::authorize(&report, &resolver)?;

        let prepared = self.prepare(&report, action).await?;

        self.mark_closed(&report, ReportStatus::Resolved, Some(action.as_str()), note, resolver_id)
            .await?;
        tracing::info!(
            report_id,
            resolver_id,
            action = action.as_str(),
            "report resolved"
        );

        let side_effect = self.dispatch(&report, prepared, note, resolver_id).await;
        if let SideEffect::Failed { detail } = &side_effect {
            tracing::error!(report_id, detail, "resolution side effect failed");
        }

        Ok(ResolveOutcome {
            report: self.get_report(report_id).await?,
            side_effect,
        })
    }

    /// Reject a report: the explicit "not actionable" decision
    pub async fn reject(&self, report_id: i64, note: &str, resolver_id: i64) -> Result<Report> {
        let report = self.get_report(report_id).await?;
        if !report.status.is_active() {
            return Err(ResolutionError::AlreadyResolved(report_id));
        }
        let resolver = self.get_caller(resolver_id).await?;
        Self::authorize(&report, &resolver)?;

        self.mark_closed(&report, ReportStatus::Rejected, None, note, resolver_id)
            .await?;
        tracing::info!(report_id, resolver_id, "report rejected");

        self.get_report(report_id).await
    }

    /// Validate the action against the report and gather everything the
    /// side effect needs, before any mutation.
    async fn prepare(&self, report: &Report, action: ResolutionAction) -> Result<PreparedAction> {
        match action {
            ResolutionAction::NoAction => Ok(PreparedAction::Nothing),
            ResolutionAction::Warning => {
                // A warning lands in the conduct history, which only exists
                // for user reports; on content reports it is record-only.
                if report.content_type == ContentType::User {
                    let target = self.moderatable_target(report.content_id).await?;
                    Ok(PreparedAction::WarnUser { target_id: target.id })
                } else {
                    Ok(PreparedAction::Nothing)
                }
            }
            ResolutionAction::RemoveContent => {
                let owners = self
                    .content
                    .owner_of(report.content_type, report.content_id)
                    .await
                    .map_err(|e| match e {
                        ContentStoreError::NotFound {
                            content_type,
                            content_id,
                        } => ResolutionError::ContentNotFound(content_type, content_id),
                        ContentStoreError::Unavailable(detail) => {
                            ResolutionError::ContentStore(detail)
                        }
                    })?;
                Ok(PreparedAction::RemoveContent { owners })
            }
            ResolutionAction::SuspendUser { days } => {
                let target = self.user_report_target(report).await?;
                Ok(PreparedAction::SuspendUser {
                    target_id: target.id,
                    days,
                })
            }
            ResolutionAction::BanUser => {
                let target = self.user_report_target(report).await?;
                Ok(PreparedAction::BanUser { target_id: target.id })
            }
        }
    }

    async fn user_report_target(&self, report: &Report) -> Result<Account> {
        if report.content_type != ContentType::User {
            return Err(ResolutionError::WrongContentType {
                content_type: report.content_type,
            });
        }
        self.moderatable_target(report.content_id).await
    }

    async fn moderatable_target(&self, target_id: i64) -> Result<Account> {
        let target = Account::fetch(&self.pool, target_id)
            .await?
            .ok_or(ResolutionError::AccountNotFound(target_id))?;
        if target.role.is_staff() {
            return Err(ResolutionError::CannotModerateAdmin);
        }
        Ok(target)
    }

    async fn mark_closed(
        &self,
        report: &Report,
        status: ReportStatus,
        action: Option<&str>,
        note: &str,
        resolver_id: i64,
    ) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE reports
                SET status = ?, resolution_action = ?, resolution_note = ?,
                    resolved_by = ?, resolved_at = ?, updated_at = ?
              WHERE id = ? AND status IN ('pending', 'in_review')",
        )
        .bind(status.as_str())
        .bind(action)
        .bind(note)
        .bind(resolver_id)
        .bind(now)
        .bind(now)
        .bind(report.id)
        .execute(&self.pool)
        .await?;

        // A racing resolver got there first.
        if result.rows_affected() == 0 {
            return Err(ResolutionError::AlreadyResolved(report.id));
        }
        Ok(())
    }

    /// Dispatch the prepared side effect. Failures are reported, not raised.
    async fn dispatch(
        &self,
        report: &Report,
        prepared: PreparedAction,
        note: &str,
        resolver_id: i64,
    ) -> SideEffect {
        match prepared {
            PreparedAction::Nothing => SideEffect::NotRequired,
            PreparedAction::WarnUser { target_id } => {
                match self
                    .standing
                    .record_warning(target_id, note, Some(resolver_id))
                    .await
                {
                    Ok(()) => SideEffect::Applied,
                    Err(e) => SideEffect::Failed {
                        detail: e.to_string(),
                    },
                }
            }
            PreparedAction::RemoveContent { owners } => {
                if let Err(e) = self
                    .content
                    .hard_delete(report.content_type, report.content_id)
                    .await
                {
                    return SideEffect::Failed {
                        detail: e.to_string(),
                    };
                }

                let message = format!(
                    "Your {} was removed after a moderation review: {}",
                    report.content_type, note
                );
                for owner in owners {
                    let notified = self
                        .notifications
                        .create(
                            owner,
                            None,
                            NotificationKind::ContentRemoved,
                            &message,
                            Some(ResourceRef {
                                kind: report.content_type.as_str().to_string(),
                                id: report.content_id,
                            }),
                        )
                        .await;
                    if let Err(e) = notified {
                        return SideEffect::Failed {
                            detail: e.to_string(),
                        };
                    }
                }
                SideEffect::Applied
            }
            PreparedAction::SuspendUser { target_id, days } => {
                match self
                    .standing
                    .suspend(target_id, days, note, Some(resolver_id))
                    .await
                {
                    Ok(_) => SideEffect::Applied,
                    Err(e) => Self::standing_failure(e),
                }
            }
            PreparedAction::BanUser { target_id } => {
                match self.standing.ban(target_id, note, Some(resolver_id)).await {
                    Ok(_) => SideEffect::Applied,
                    Err(e) => Self::standing_failure(e),
                }
            }
        }
    }

    fn standing_failure(e: StandingError) -> SideEffect {
        SideEffect::Failed {
            detail: e.to_string(),
        }
    }
}
