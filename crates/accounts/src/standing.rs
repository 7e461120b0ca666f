//! Account standing service
//!
//! Suspension, ban, and conduct-lives lifecycle. A user is in exactly one of
//! active / suspended / banned at any time, with an independent lives counter
//! feeding the automated escalation path. Suspension restricts in-app actions
//! (uploading) but never authentication; a ban blocks login entirely.
//!
//! Suspension expiry is lazy: there is no background sweep. The
//! authentication collaborator calls [`StandingService::check_login`] before
//! credential checks, and an elapsed suspension is cleared atomically at that
//! point.
//!
//! Every mutating entry point re-checks the target's role and fails closed:
//! admin and super_admin accounts are never subject to suspend/ban/life
//! operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::str::FromStr;
use thiserror::Error;

use crate::account::{Account, DEFAULT_LIVES, MAX_LIVES};
use storage::ErrorKind;

/// Ban reason recorded by the automated zero-lives path; reversals key on it
pub const ZERO_LIVES_BAN_REASON: &str = "all conduct lives exhausted";

/// Errors from standing operations
#[derive(Debug, Error)]
pub enum StandingError {
    /// No account with that id
    #[error("Account not found: {0}")]
    NotFound(i64),

    /// Target is moderation staff; suspend/ban/life operations never apply
    #[error("Moderation actions cannot target admin accounts")]
    CannotModerateAdmin,

    /// Login refused: the account is banned
    #[error("Account is banned")]
    Banned {
        /// Reason recorded with the ban
        reason: Option<String>,
    },

    /// Upload refused while suspended or upload-revoked
    #[error("Uploads are restricted for this account")]
    UploadRestricted,

    /// Life adjustments must grant between 1 and 10 lives
    #[error("Life adjustment must be between 1 and 10, got {0}")]
    InvalidLifeAmount(i64),

    /// Storage failure
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl StandingError {
    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            StandingError::NotFound(_) => ErrorKind::NotFound,
            StandingError::CannotModerateAdmin => ErrorKind::Forbidden,
            StandingError::Banned { .. } => ErrorKind::Forbidden,
            StandingError::UploadRestricted => ErrorKind::PolicyViolation,
            StandingError::InvalidLifeAmount(_) => ErrorKind::Validation,
            StandingError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for standing operations
pub type Result<T> = std::result::Result<T, StandingError>;

/// Kind of event recorded in the conduct history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConductAction {
    /// Formal warning recorded against the account
    Warning,
    /// Suspension issued
    Suspension,
    /// Suspension cleared automatically at login
    SuspensionExpired,
    /// Ban issued
    Ban,
    /// Zero-lives ban reversed by a life grant
    BanReversed,
    /// One life deducted by the automated path
    LifeDeducted,
    /// Lives granted by a moderator
    LivesGranted,
    /// Lives reset to the default
    LivesReset,
    /// Suspension and ban cleared by moderator override
    Reactivated,
}

impl ConductAction {
    /// Stable string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            ConductAction::Warning => "warning",
            ConductAction::Suspension => "suspension",
            ConductAction::SuspensionExpired => "suspension_expired",
            ConductAction::Ban => "ban",
            ConductAction::BanReversed => "ban_reversed",
            ConductAction::LifeDeducted => "life_deducted",
            ConductAction::LivesGranted => "lives_granted",
            ConductAction::LivesReset => "lives_reset",
            ConductAction::Reactivated => "reactivated",
        }
    }
}

impl FromStr for ConductAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "warning" => Ok(ConductAction::Warning),
            "suspension" => Ok(ConductAction::Suspension),
            "suspension_expired" => Ok(ConductAction::SuspensionExpired),
            "ban" => Ok(ConductAction::Ban),
            "ban_reversed" => Ok(ConductAction::BanReversed),
            "life_deducted" => Ok(ConductAction::LifeDeducted),
            "lives_granted" => Ok(ConductAction::LivesGranted),
            "lives_reset" => Ok(ConductAction::LivesReset),
            "reactivated" => Ok(ConductAction::Reactivated),
            other => Err(format!("unknown conduct action: {other}")),
        }
    }
}

/// One entry in an account's append-only conduct log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConductEntry {
    /// Entry id
    pub id: i64,
    /// Account the entry belongs to
    pub user_id: i64,
    /// What happened
    pub action: ConductAction,
    /// Reason recorded by the moderator or the system
    pub reason: String,
    /// Acting moderator; `None` means the system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderator_id: Option<i64>,
    /// Lives remaining after the event
    pub lives_remaining: i64,
    /// When the event happened
    pub created_at: DateTime<Utc>,
}

impl ConductEntry {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let action_str: String = row.try_get("action")?;
        let action = ConductAction::from_str(&action_str).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "action".to_string(),
                source: e.into(),
            }
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            action,
            reason: row.try_get("reason")?,
            moderator_id: row.try_get("moderator_id")?,
            lives_remaining: row.try_get("lives_remaining")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Append a conduct entry through any executor (pool or open transaction)
async fn append_conduct<'e, E>(
    executor: E,
    user_id: i64,
    action: ConductAction,
    reason: &str,
    moderator_id: Option<i64>,
    lives_remaining: i64,
) -> std::result::Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO conduct_history
            (user_id, action, reason, moderator_id, lives_remaining, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(action.as_str())
    .bind(reason)
    .bind(moderator_id)
    .bind(lives_remaining)
    .bind(Utc::now())
    .execute(executor)
    .await?;
    Ok(())
}

/// Account standing service
///
/// Stateless over a shared pool; every mutation is a single transaction so
/// no caller observes a standing change without its conduct entry.
#[derive(Clone)]
pub struct StandingService {
    pool: SqlitePool,
}

impl StandingService {
    /// Create a new standing service
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch an account, failing with `NotFound` if missing
    pub async fn get_account(&self, user_id: i64) -> Result<Account> {
        Account::fetch(&self.pool, user_id)
            .await?
            .ok_or(StandingError::NotFound(user_id))
    }

    /// Admin immunity: suspend/ban/life operations never target staff
    fn ensure_moderatable(account: &Account) -> Result<()> {
        if account.role.is_staff() {
            return Err(StandingError::CannotModerateAdmin);
        }
        Ok(())
    }

    // =========================================================================
    // Suspension and ban
    // =========================================================================

    /// Suspend an account for `days` days (`0` = indefinite, manual lift)
    ///
    /// Suspension revokes uploading but never blocks login.
    pub async fn suspend(
        &self,
        user_id: i64,
        days: u32,
        reason: &str,
        moderator_id: Option<i64>,
    ) -> Result<Account> {
        let account = self.get_account(user_id).await?;
        Self::ensure_moderatable(&account)?;

        let until: Option<DateTime<Utc>> = if days == 0 {
            None
        } else {
            Some(Utc::now() + chrono::Duration::days(days as i64))
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE users
                SET is_suspended = 1, suspended_until = ?, suspension_reason = ?, can_upload = 0
              WHERE id = ?",
        )
        .bind(until)
        .bind(reason)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        append_conduct(
            &mut *tx,
            user_id,
            ConductAction::Suspension,
            reason,
            moderator_id,
            account.lives,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(user_id, days, "account suspended");
        self.get_account(user_id).await
    }

    /// Ban an account
    ///
    /// Banned accounts cannot log in at all. Any suspension deadline is
    /// cleared; the ban supersedes it.
    pub async fn ban(
        &self,
        user_id: i64,
        reason: &str,
        moderator_id: Option<i64>,
    ) -> Result<Account> {
        let account = self.get_account(user_id).await?;
        Self::ensure_moderatable(&account)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE users
                SET is_banned = 1, ban_reason = ?, is_active = 0,
                    suspended_until = NULL, can_upload = 0
              WHERE id = ?",
        )
        .bind(reason)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        append_conduct(
            &mut *tx,
            user_id,
            ConductAction::Ban,
            reason,
            moderator_id,
            account.lives,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(user_id, "account banned");
        self.get_account(user_id).await
    }

    /// Clear both suspension and ban unconditionally (moderator override)
    ///
    /// Independent of the lives counter; the counter keeps its value.
    pub async fn reactivate(&self, user_id: i64, moderator_id: Option<i64>) -> Result<Account> {
        let account = self.get_account(user_id).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE users
                SET is_suspended = 0, suspended_until = NULL, suspension_reason = NULL,
                    is_banned = 0, ban_reason = NULL, is_active = 1, can_upload = 1
              WHERE id = ?",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        append_conduct(
            &mut *tx,
            user_id,
            ConductAction::Reactivated,
            "standing cleared by moderator override",
            moderator_id,
            account.lives,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(user_id, "account reactivated");
        self.get_account(user_id).await
    }

    // =========================================================================
    // Login and upload gates
    // =========================================================================

    /// Standing gate the authentication service runs before credential checks
    ///
    /// Bans block login. Suspensions do not, but an elapsed suspension is
    /// cleared here atomically (lazy expiry) with a conduct entry, restoring
    /// upload rights before the login proceeds.
    pub async fn check_login(&self, user_id: i64) -> Result<Account> {
        let account = self.get_account(user_id).await?;

        if account.is_banned {
            return Err(StandingError::Banned {
                reason: account.ban_reason,
            });
        }

        if account.is_suspended {
            if let Some(until) = account.suspended_until {
                if Utc::now() > until {
                    let mut tx = self.pool.begin().await?;
                    sqlx::query(
                        "UPDATE users
                            SET is_suspended = 0, suspended_until = NULL,
                                suspension_reason = NULL, can_upload = 1
                          WHERE id = ?",
                    )
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                    append_conduct(
                        &mut *tx,
                        user_id,
                        ConductAction::SuspensionExpired,
                        "suspension period elapsed",
                        None,
                        account.lives,
                    )
                    .await?;
                    tx.commit().await?;

                    tracing::info!(user_id, "suspension expired at login");
                    return self.get_account(user_id).await;
                }
            }
        }

        Ok(account)
    }

    /// Upload gate: suspended or upload-revoked accounts may not upload
    pub async fn assert_can_upload(&self, user_id: i64) -> Result<()> {
        let account = self.get_account(user_id).await?;
        if account.is_suspended || !account.can_upload {
            return Err(StandingError::UploadRestricted);
        }
        Ok(())
    }

    // =========================================================================
    // Conduct lives
    // =========================================================================

    /// Grant `amount` lives (1..=10), clamped to the maximum of 10
    ///
    /// If the account sat at zero lives under the automated zero-lives ban,
    /// reaching a positive count reverses that ban.
    pub async fn add_lives(
        &self,
        user_id: i64,
        amount: i64,
        moderator_id: Option<i64>,
    ) -> Result<Account> {
        if !(1..=MAX_LIVES).contains(&amount) {
            return Err(StandingError::InvalidLifeAmount(amount));
        }
        let account = self.get_account(user_id).await?;
        Self::ensure_moderatable(&account)?;

        let new_lives = (account.lives + amount).min(MAX_LIVES);
        let reverses_ban = account.lives == 0
            && account.is_banned
            && account.ban_reason.as_deref() == Some(ZERO_LIVES_BAN_REASON);

        self.apply_life_change(
            &account,
            new_lives,
            reverses_ban,
            ConductAction::LivesGranted,
            &format!("granted {amount} conduct lives"),
            moderator_id,
        )
        .await
    }

    /// Reset lives to the default of 3 unconditionally
    ///
    /// Reverses an automated zero-lives ban the same way as a grant.
    pub async fn reset_lives(&self, user_id: i64, moderator_id: Option<i64>) -> Result<Account> {
        let account = self.get_account(user_id).await?;
        Self::ensure_moderatable(&account)?;

        let reverses_ban =
            account.is_banned && account.ban_reason.as_deref() == Some(ZERO_LIVES_BAN_REASON);

        self.apply_life_change(
            &account,
            DEFAULT_LIVES,
            reverses_ban,
            ConductAction::LivesReset,
            "conduct lives reset",
            moderator_id,
        )
        .await
    }

    /// Deduct one life on the automated escalation path
    ///
    /// Reaching zero disables the account under the canonical zero-lives
    /// ban, which a later grant or reset reverses.
    pub async fn deduct_life(&self, user_id: i64, reason: &str) -> Result<Account> {
        let account = self.get_account(user_id).await?;
        Self::ensure_moderatable(&account)?;

        let new_lives = (account.lives - 1).max(0);

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE users SET lives = ? WHERE id = ?")
            .bind(new_lives)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        append_conduct(
            &mut *tx,
            user_id,
            ConductAction::LifeDeducted,
            reason,
            None,
            new_lives,
        )
        .await?;

        if new_lives == 0 && !account.is_banned {
            sqlx::query(
                "UPDATE users
                    SET is_banned = 1, ban_reason = ?, is_active = 0,
                        suspended_until = NULL, can_upload = 0
                  WHERE id = ?",
            )
            .bind(ZERO_LIVES_BAN_REASON)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            append_conduct(
                &mut *tx,
                user_id,
                ConductAction::Ban,
                ZERO_LIVES_BAN_REASON,
                None,
                0,
            )
            .await?;
            tracing::warn!(user_id, "account auto-banned at zero lives");
        }
        tx.commit().await?;

        self.get_account(user_id).await
    }

    async fn apply_life_change(
        &self,
        account: &Account,
        new_lives: i64,
        reverses_ban: bool,
        action: ConductAction,
        reason: &str,
        moderator_id: Option<i64>,
    ) -> Result<Account> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE users SET lives = ? WHERE id = ?")
            .bind(new_lives)
            .bind(account.id)
            .execute(&mut *tx)
            .await?;
        append_conduct(&mut *tx, account.id, action, reason, moderator_id, new_lives).await?;

        if reverses_ban && new_lives > 0 {
            sqlx::query(
                "UPDATE users
                    SET is_banned = 0, ban_reason = NULL, is_active = 1, can_upload = 1
                  WHERE id = ?",
            )
            .bind(account.id)
            .execute(&mut *tx)
            .await?;
            append_conduct(
                &mut *tx,
                account.id,
                ConductAction::BanReversed,
                "zero-lives ban reversed by life grant",
                moderator_id,
                new_lives,
            )
            .await?;
            tracing::info!(user_id = account.id, "zero-lives ban reversed");
        }
        tx.commit().await?;

        self.get_account(account.id).await
    }

    // =========================================================================
    // Warnings and history
    // =========================================================================

    /// Record a formal warning in the conduct history
    pub async fn record_warning(
        &self,
        user_id: i64,
        reason: &str,
        moderator_id: Option<i64>,
    ) -> Result<()> {
        let account = self.get_account(user_id).await?;
        Self::ensure_moderatable(&account)?;

        append_conduct(
            &self.pool,
            user_id,
            ConductAction::Warning,
            reason,
            moderator_id,
            account.lives,
        )
        .await?;
        Ok(())
    }

    /// The account's conduct log, oldest first
    pub async fn conduct_history(&self, user_id: i64) -> Result<Vec<ConductEntry>> {
        // Existence check keeps a missing account distinct from an empty log.
        self.get_account(user_id).await?;

        let rows = sqlx::query(
            "SELECT * FROM conduct_history WHERE user_id = ? ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| ConductEntry::from_row(r).map_err(StandingError::from))
            .collect()
    }
}
