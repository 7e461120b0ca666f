//! Report intake and routing
//!
//! Intake validates the reporter and the target, rejects self-reports, and
//! enforces the single-active-investigation rule: at most one active report
//! per reporter+content pair, and at most one active report system-wide per
//! content item. The read-side checks classify the error for the caller;
//! the partial unique index on active reports closes the race between two
//! simultaneous submissions.
//!
//! New reports are assigned to the active admin carrying the fewest active
//! cases, ties broken by enumeration order. Super admins supervise and
//! never receive caseload; if no admin exists the report is left
//! unassigned and surfaces in the orphan queue for manual assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use accounts::{Account, AdminDirectory, Capability};
use storage::ErrorKind;

use crate::content::{ContentStore, ContentStoreError, ContentType};

/// Maximum length for a report description (in characters)
const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Errors from report intake and routing
#[derive(Debug, Error)]
pub enum ReportError {
    /// Description exceeds the length cap
    #[error("Report description too long: {0} characters (max {1})")]
    DescriptionTooLong(usize, usize),

    /// No account with that id
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    /// No report with that id
    #[error("Report not found: {0}")]
    ReportNotFound(i64),

    /// The reported content does not exist
    #[error("Content not found: {0} {1}")]
    ContentNotFound(ContentType, i64),

    /// Reporters cannot report their own content
    #[error("Cannot report your own content")]
    SelfReport,

    /// Banned accounts cannot file reports
    #[error("Banned accounts cannot file reports")]
    ReporterBanned,

    /// This reporter already has an active report for this content
    #[error("An active report for this content already exists from this reporter")]
    DuplicateActiveReport,

    /// Someone else's active report already covers this content
    #[error("This content is already under investigation")]
    ContentAlreadyUnderInvestigation,

    /// The caller's role does not grant the required capability
    #[error("Operation requires the {0} capability")]
    NotPermitted(Capability),

    /// Reassignment target is not an active admin or super admin
    #[error("Account {0} is not an active moderator")]
    InvalidAssignee(i64),

    /// The report has reached a terminal status
    #[error("Report {0} is closed")]
    ReportClosed(i64),

    /// The content collaborator failed
    #[error("Content store unavailable: {0}")]
    ContentStore(String),

    /// Storage failure
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl ReportError {
    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::DescriptionTooLong(_, _) => ErrorKind::Validation,
            ReportError::AccountNotFound(_) => ErrorKind::NotFound,
            ReportError::ReportNotFound(_) => ErrorKind::NotFound,
            ReportError::ContentNotFound(_, _) => ErrorKind::NotFound,
            ReportError::SelfReport => ErrorKind::Forbidden,
            ReportError::ReporterBanned => ErrorKind::Forbidden,
            ReportError::DuplicateActiveReport => ErrorKind::Conflict,
            ReportError::ContentAlreadyUnderInvestigation => ErrorKind::Conflict,
            ReportError::NotPermitted(_) => ErrorKind::Forbidden,
            ReportError::InvalidAssignee(_) => ErrorKind::Validation,
            ReportError::ReportClosed(_) => ErrorKind::Conflict,
            ReportError::ContentStore(_) => ErrorKind::Internal,
            ReportError::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl From<ContentStoreError> for ReportError {
    fn from(e: ContentStoreError) -> Self {
        match e {
            ContentStoreError::NotFound {
                content_type,
                content_id,
            } => ReportError::ContentNotFound(content_type, content_id),
            ContentStoreError::Unavailable(detail) => ReportError::ContentStore(detail),
        }
    }
}

impl From<accounts::directory::DirectoryError> for ReportError {
    fn from(e: accounts::directory::DirectoryError) -> Self {
        match e {
            accounts::directory::DirectoryError::Storage(s) => ReportError::Storage(s),
        }
    }
}

/// Result type for report operations
pub type Result<T> = std::result::Result<T, ReportError>;

/// Reason for filing a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    /// Unsolicited promotion, engagement farming
    Spam,
    /// Targeted abuse of another account
    Harassment,
    /// Hateful conduct or slurs
    HateSpeech,
    /// Unlicensed use of someone else's work
    Copyright,
    /// Pretending to be another artist or label
    Impersonation,
    /// Unmarked explicit material
    ExplicitContent,
    /// Anything the other categories miss
    Other,
}

impl ReportReason {
    /// Stable string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportReason::Spam => "spam",
            ReportReason::Harassment => "harassment",
            ReportReason::HateSpeech => "hate_speech",
            ReportReason::Copyright => "copyright",
            ReportReason::Impersonation => "impersonation",
            ReportReason::ExplicitContent => "explicit_content",
            ReportReason::Other => "other",
        }
    }
}

impl FromStr for ReportReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "spam" => Ok(ReportReason::Spam),
            "harassment" => Ok(ReportReason::Harassment),
            "hate_speech" => Ok(ReportReason::HateSpeech),
            "copyright" => Ok(ReportReason::Copyright),
            "impersonation" => Ok(ReportReason::Impersonation),
            "explicit_content" => Ok(ReportReason::ExplicitContent),
            "other" => Ok(ReportReason::Other),
            other => Err(format!("unknown report reason: {other}")),
        }
    }
}

/// Lifecycle status of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Filed, awaiting review
    Pending,
    /// Opened by the assigned admin
    InReview,
    /// Closed with a recorded resolution
    Resolved,
    /// Closed as not actionable
    Rejected,
}

impl ReportStatus {
    /// Stable string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::InReview => "in_review",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
        }
    }

    /// Whether the report still occupies the active-investigation slot
    pub fn is_active(&self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::InReview)
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "in_review" => Ok(ReportStatus::InReview),
            "resolved" => Ok(ReportStatus::Resolved),
            "rejected" => Ok(ReportStatus::Rejected),
            other => Err(format!("unknown report status: {other}")),
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Routine
    Low,
    /// Default
    Medium,
    /// Needs attention soon
    High,
    /// Drop everything
    Urgent,
}

impl Priority {
    /// Stable string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// A report record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Report id
    pub id: i64,
    /// Account that filed the report
    pub reporter_id: i64,
    /// Kind of content reported
    pub content_type: ContentType,
    /// Id of the reported content (an account id for `user` reports)
    pub content_id: i64,
    /// Why it was reported
    pub reason: ReportReason,
    /// Free-form details from the reporter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lifecycle status
    pub status: ReportStatus,
    /// Review priority
    pub priority: Priority,
    /// Admin carrying the case; `None` means orphaned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_admin_id: Option<i64>,
    /// Action taken at resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_action: Option<String>,
    /// Note recorded at resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
    /// Admin that closed the report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<i64>,
    /// When the report was closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// When the report was filed
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub(crate) fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        fn decode<T: FromStr<Err = String>>(
            row: &SqliteRow,
            column: &str,
        ) -> std::result::Result<T, sqlx::Error> {
            let raw: String = row.try_get(column)?;
            T::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: e.into(),
            })
        }

        Ok(Self {
            id: row.try_get("id")?,
            reporter_id: row.try_get("reporter_id")?,
            content_type: decode(row, "content_type")?,
            content_id: row.try_get("content_id")?,
            reason: decode(row, "reason")?,
            description: row.try_get("description")?,
            status: decode(row, "status")?,
            priority: decode(row, "priority")?,
            assigned_admin_id: row.try_get("assigned_admin_id")?,
            resolution_action: row.try_get("resolution_action")?,
            resolution_note: row.try_get("resolution_note")?,
            resolved_by: row.try_get("resolved_by")?,
            resolved_at: row.try_get("resolved_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Report router
///
/// Intake, duplicate guards, and caseload-balanced assignment.
pub struct ReportRouter {
    pool: SqlitePool,
    content: Arc<dyn ContentStore>,
    directory: AdminDirectory,
}

impl ReportRouter {
    /// Create a new router over the shared pool and content collaborator
    pub fn new(pool: SqlitePool, content: Arc<dyn ContentStore>) -> Self {
        let directory = AdminDirectory::new(pool.clone());
        Self {
            pool,
            content,
            directory,
        }
    }

    /// File a report
    ///
    /// Reports are confidential until resolved: nobody is notified at
    /// intake, least of all the reported party.
    ///
    /// # Errors
    ///
    /// - `ReportError::DescriptionTooLong` - description over the cap
    /// - `ReportError::SelfReport` - reporter owns the content
    /// - `ReportError::DuplicateActiveReport` - reporter already has an
    ///   active report for this content
    /// - `ReportError::ContentAlreadyUnderInvestigation` - another active
    ///   report already covers this content
    pub async fn submit(
        &self,
        reporter_id: i64,
        content_type: ContentType,
        content_id: i64,
        reason: ReportReason,
        description: Option<&str>,
    ) -> Result<Report> {
        if let Some(d) = description {
            let len = d.chars().count();
            if len > MAX_DESCRIPTION_LENGTH {
                return Err(ReportError::DescriptionTooLong(len, MAX_DESCRIPTION_LENGTH));
            }
        }

        let reporter = Account::fetch(&self.pool, reporter_id)
            .await?
            .ok_or(ReportError::AccountNotFound(reporter_id))?;
        if reporter.is_banned {
            return Err(ReportError::ReporterBanned);
        }

        // Self-report check; ownership semantics differ per content type.
        if content_type == ContentType::User {
            if content_id == reporter_id {
                return Err(ReportError::SelfReport);
            }
            Account::fetch(&self.pool, content_id)
                .await?
                .ok_or(ReportError::ContentNotFound(content_type, content_id))?;
        } else {
            let owners = self.content.owner_of(content_type, content_id).await?;
            if owners.contains(&reporter_id) {
                return Err(ReportError::SelfReport);
            }
        }

        // Read-side duplicate guards classify the failure; the partial
        // unique index below closes the race between two submissions.
        if let Some(existing) = self.active_report_for(content_type, content_id).await? {
            if existing.reporter_id == reporter_id {
                return Err(ReportError::DuplicateActiveReport);
            }
            return Err(ReportError::ContentAlreadyUnderInvestigation);
        }

        let assigned_admin_id = self.pick_least_loaded_admin().await?;
        if assigned_admin_id.is_none() {
            tracing::warn!(
                content_type = content_type.as_str(),
                content_id,
                "no active admins; report filed unassigned"
            );
        }

        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO reports
                (reporter_id, content_type, content_id, reason, description,
                 status, priority, assigned_admin_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'pending', 'medium', ?, ?, ?)",
        )
        .bind(reporter_id)
        .bind(content_type.as_str())
        .bind(content_id)
        .bind(reason.as_str())
        .bind(description)
        .bind(assigned_admin_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        let report_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e)
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false) =>
            {
                return Err(ReportError::ContentAlreadyUnderInvestigation);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(report_id, reporter_id, assigned_admin_id, "report filed");
        self.get(report_id).await
    }

    /// Move a report onto a different moderator's caseload (super admin only)
    ///
    /// This is the designed recovery path for reviews abandoned mid-flight;
    /// there is no timeout-based release.
    pub async fn reassign(
        &self,
        report_id: i64,
        new_admin_id: i64,
        caller_id: i64,
    ) -> Result<Report> {
        let caller = Account::fetch(&self.pool, caller_id)
            .await?
            .ok_or(ReportError::AccountNotFound(caller_id))?;
        if !caller.role.can(Capability::ReassignReports) {
            return Err(ReportError::NotPermitted(Capability::ReassignReports));
        }
        if !self.directory.is_active_moderator(new_admin_id).await? {
            return Err(ReportError::InvalidAssignee(new_admin_id));
        }

        let report = self.get(report_id).await?;
        if !report.status.is_active() {
            return Err(ReportError::ReportClosed(report_id));
        }

        sqlx::query("UPDATE reports SET assigned_admin_id = ?, updated_at = ? WHERE id = ?")
            .bind(new_admin_id)
            .bind(Utc::now())
            .bind(report_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(report_id, new_admin_id, "report reassigned");
        self.get(report_id).await
    }

    /// Change a report's priority without a status transition
    pub async fn set_priority(
        &self,
        report_id: i64,
        priority: Priority,
        caller_id: i64,
    ) -> Result<Report> {
        let caller = Account::fetch(&self.pool, caller_id)
            .await?
            .ok_or(ReportError::AccountNotFound(caller_id))?;
        if !caller.role.can(Capability::ChangePriority) {
            return Err(ReportError::NotPermitted(Capability::ChangePriority));
        }

        let report = self.get(report_id).await?;
        if !report.status.is_active() {
            return Err(ReportError::ReportClosed(report_id));
        }

        sqlx::query("UPDATE reports SET priority = ?, updated_at = ? WHERE id = ?")
            .bind(priority.as_str())
            .bind(Utc::now())
            .bind(report_id)
            .execute(&self.pool)
            .await?;

        self.get(report_id).await
    }

    /// Fetch a report by id
    pub async fn get(&self, report_id: i64) -> Result<Report> {
        let row = sqlx::query("SELECT * FROM reports WHERE id = ?")
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ReportError::ReportNotFound(report_id))?;
        Ok(Report::from_row(&row)?)
    }

    /// Active reports on an admin's caseload, oldest first
    pub async fn assigned_to(&self, admin_id: i64) -> Result<Vec<Report>> {
        let rows = sqlx::query(
            "SELECT * FROM reports
              WHERE assigned_admin_id = ? AND status IN ('pending', 'in_review')
              ORDER BY id ASC",
        )
        .bind(admin_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| Report::from_row(r).map_err(ReportError::from))
            .collect()
    }

    /// Active reports with no assigned admin, for manual assignment
    pub async fn unassigned(&self) -> Result<Vec<Report>> {
        let rows = sqlx::query(
            "SELECT * FROM reports
              WHERE assigned_admin_id IS NULL AND status IN ('pending', 'in_review')
              ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| Report::from_row(r).map_err(ReportError::from))
            .collect()
    }

    async fn active_report_for(
        &self,
        content_type: ContentType,
        content_id: i64,
    ) -> Result<Option<Report>> {
        let row = sqlx::query(
            "SELECT * FROM reports
              WHERE content_type = ? AND content_id = ?
                AND status IN ('pending', 'in_review')",
        )
        .bind(content_type.as_str())
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Report::from_row(&r)).transpose()?)
    }

    /// The active admin with the fewest active cases; enumeration (id)
    /// order breaks ties.
    async fn pick_least_loaded_admin(&self) -> Result<Option<i64>> {
        let admins = self.directory.active_admins().await?;
        if admins.is_empty() {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT assigned_admin_id, COUNT(*) AS active_cases
               FROM reports
              WHERE status IN ('pending', 'in_review') AND assigned_admin_id IS NOT NULL
              GROUP BY assigned_admin_id",
        )
        .fetch_all(&self.pool)
        .await?;
        let caseload: HashMap<i64, i64> = rows
            .iter()
            .map(|r| (r.get("assigned_admin_id"), r.get("active_cases")))
            .collect();

        let mut best: Option<(i64, i64)> = None;
        for admin in &admins {
            let cases = caseload.get(&admin.id).copied().unwrap_or(0);
            match best {
                Some((_, fewest)) if cases >= fewest => {}
                _ => best = Some((admin.id, cases)),
            }
        }
        Ok(best.map(|(id, _)| id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MockContentStore;
    use accounts::Role;

    const ARTIST_ID: i64 = 100;

    fn content_owned_by(owner: i64) -> Arc<dyn ContentStore> {
        let mut store = MockContentStore::new();
        store
            .expect_owner_of()
            .returning(move |_, _| Ok(vec![owner]));
        store.expect_hard_delete().returning(|_, _| Ok(()));
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_submit_assigns_pending_report() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();
        let admin = Account::create(pool, "mod-a", Role::Admin).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let report = router
            .submit(
                reporter.id,
                ContentType::Song,
                7,
                ReportReason::Spam,
                Some("bot-generated track"),
            )
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.priority, Priority::Medium);
        assert_eq!(report.assigned_admin_id, Some(admin.id));
        assert_eq!(report.reason, ReportReason::Spam);
        assert!(report.resolved_at.is_none());
    }

    #[tokio::test]
    async fn test_submit_rejects_self_report_via_ownership() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let artist = Account::create(pool, "artist", Role::User).await.unwrap();
        Account::create(pool, "mod-a", Role::Admin).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(artist.id));
        let err = router
            .submit(artist.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::SelfReport));
        assert_eq!(err.kind(), storage::ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_submit_rejects_self_report_on_own_account() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let err = router
            .submit(
                reporter.id,
                ContentType::User,
                reporter.id,
                ReportReason::Harassment,
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::SelfReport));
    }

    #[tokio::test]
    async fn test_duplicate_and_under_investigation_guards() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let r1 = Account::create(pool, "listener-1", Role::User).await.unwrap();
        let r2 = Account::create(pool, "listener-2", Role::User).await.unwrap();
        Account::create(pool, "mod-a", Role::Admin).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        router
            .submit(r1.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap();

        // Same reporter, same content: duplicate.
        let err = router
            .submit(r1.id, ContentType::Song, 7, ReportReason::Copyright, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::DuplicateActiveReport));
        assert_eq!(err.kind(), storage::ErrorKind::Conflict);

        // Different reporter, same content: one investigation at a time.
        let err = router
            .submit(r2.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::ContentAlreadyUnderInvestigation));

        // A different content item is unaffected.
        router
            .submit(r2.id, ContentType::Song, 8, ReportReason::Spam, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_terminal_report_frees_the_content_slot() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let r1 = Account::create(pool, "listener-1", Role::User).await.unwrap();
        let r2 = Account::create(pool, "listener-2", Role::User).await.unwrap();
        Account::create(pool, "mod-a", Role::Admin).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let report = router
            .submit(r1.id, ContentType::Album, 3, ReportReason::Copyright, None)
            .await
            .unwrap();

        sqlx::query("UPDATE reports SET status = 'resolved' WHERE id = ?")
            .bind(report.id)
            .execute(pool)
            .await
            .unwrap();

        router
            .submit(r2.id, ContentType::Album, 3, ReportReason::Copyright, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_assignment_picks_least_loaded_admin() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let a1 = Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        let a2 = Account::create(pool, "mod-b", Role::Admin).await.unwrap();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));

        // Give a1 two active cases by hand.
        for content_id in [50, 51] {
            sqlx::query(
                "INSERT INTO reports
                    (reporter_id, content_type, content_id, reason, status, priority,
                     assigned_admin_id, created_at, updated_at)
                 VALUES (?, 'song', ?, 'spam', 'in_review', 'medium', ?, ?, ?)",
            )
            .bind(reporter.id)
            .bind(content_id)
            .bind(a1.id)
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(pool)
            .await
            .unwrap();
        }

        let report = router
            .submit(reporter.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap();
        assert_eq!(report.assigned_admin_id, Some(a2.id));
    }

    #[tokio::test]
    async fn test_assignment_tie_breaks_by_enumeration_order() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let a1 = Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        Account::create(pool, "mod-b", Role::Admin).await.unwrap();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let report = router
            .submit(reporter.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap();
        assert_eq!(report.assigned_admin_id, Some(a1.id));
    }

    #[tokio::test]
    async fn test_no_admins_leaves_report_orphaned() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        Account::create(pool, "root", Role::SuperAdmin).await.unwrap();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let report = router
            .submit(reporter.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap();

        // Super admins carry no caseload: orphaned, visible in the queue.
        assert_eq!(report.assigned_admin_id, None);
        let orphans = router.unassigned().await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, report.id);
    }

    #[tokio::test]
    async fn test_reassign_is_super_admin_only() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let admin = Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        let other = Account::create(pool, "mod-b", Role::Admin).await.unwrap();
        let root = Account::create(pool, "root", Role::SuperAdmin).await.unwrap();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let report = router
            .submit(reporter.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap();
        assert_eq!(report.assigned_admin_id, Some(admin.id));

        // Admins cannot reassign, not even to themselves.
        let err = router
            .reassign(report.id, other.id, admin.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReportError::NotPermitted(Capability::ReassignReports)
        ));
        assert_eq!(err.kind(), storage::ErrorKind::Forbidden);

        let report = router.reassign(report.id, other.id, root.id).await.unwrap();
        assert_eq!(report.assigned_admin_id, Some(other.id));
    }

    #[tokio::test]
    async fn test_reassign_validates_target() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        let root = Account::create(pool, "root", Role::SuperAdmin).await.unwrap();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let report = router
            .submit(reporter.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap();

        // A regular user is not a valid assignee.
        let err = router
            .reassign(report.id, reporter.id, root.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidAssignee(_)));

        // A super admin is: manual assignment of orphans lands on them too.
        let report = router.reassign(report.id, root.id, root.id).await.unwrap();
        assert_eq!(report.assigned_admin_id, Some(root.id));
    }

    #[tokio::test]
    async fn test_set_priority_requires_active_report_and_staff_caller() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let admin = Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let report = router
            .submit(reporter.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap();

        let err = router
            .set_priority(report.id, Priority::Urgent, reporter.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReportError::NotPermitted(Capability::ChangePriority)
        ));

        let report = router
            .set_priority(report.id, Priority::Urgent, admin.id)
            .await
            .unwrap();
        assert_eq!(report.priority, Priority::Urgent);

        sqlx::query("UPDATE reports SET status = 'resolved' WHERE id = ?")
            .bind(report.id)
            .execute(pool)
            .await
            .unwrap();
        let err = router
            .set_priority(report.id, Priority::Low, admin.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::ReportClosed(_)));
        assert_eq!(err.kind(), storage::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_banned_reporter_is_rejected() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();
        sqlx::query("UPDATE users SET is_banned = 1, is_active = 0 WHERE id = ?")
            .bind(reporter.id)
            .execute(pool)
            .await
            .unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let err = router
            .submit(reporter.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::ReporterBanned));
    }

    #[tokio::test]
    async fn test_description_length_cap() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let long = "x".repeat(MAX_DESCRIPTION_LENGTH + 1);
        let err = router
            .submit(
                reporter.id,
                ContentType::Song,
                7,
                ReportReason::Spam,
                Some(&long),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::DescriptionTooLong(_, _)));
        assert_eq!(err.kind(), storage::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_missing_content_is_rejected_before_insert() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let mut store = MockContentStore::new();
        store
            .expect_owner_of()
            .returning(|content_type, content_id| {
                Err(ContentStoreError::NotFound {
                    content_type,
                    content_id,
                })
            });
        let router = ReportRouter::new(pool.clone(), Arc::new(store));

        let err = router
            .submit(
                reporter.id,
                ContentType::Playlist,
                9,
                ReportReason::Spam,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReportError::ContentNotFound(ContentType::Playlist, 9)
        ));
        assert_eq!(err.kind(), storage::ErrorKind::NotFound);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_assigned_to_lists_active_caseload() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();
        let admin = Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        let reporter = Account::create(pool, "listener", Role::User).await.unwrap();

        let router = ReportRouter::new(pool.clone(), content_owned_by(ARTIST_ID));
        let first = router
            .submit(reporter.id, ContentType::Song, 7, ReportReason::Spam, None)
            .await
            .unwrap();
        router
            .submit(reporter.id, ContentType::Song, 8, ReportReason::Spam, None)
            .await
            .unwrap();

        assert_eq!(router.assigned_to(admin.id).await.unwrap().len(), 2);

        sqlx::query("UPDATE reports SET status = 'resolved' WHERE id = ?")
            .bind(first.id)
            .execute(pool)
            .await
            .unwrap();
        assert_eq!(router.assigned_to(admin.id).await.unwrap().len(), 1);
    }
}
