//! Block consistency engine
//!
//! Creating a block tears down every other relationship between the two
//! accounts: friendship records in either direction, follow edges in both
//! directions, and notification visibility. The teardown and the block
//! insert run in a single transaction; a crash can never leave a block
//! behind with stale edges or counters. Counters are recounted from the
//! edge set inside the same transaction.
//!
//! Unblocking is owner-only: the blocked party cannot lift a block that
//! was placed on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use thiserror::Error;

use accounts::Account;
use storage::ErrorKind;

use crate::relationships::recompute_counts;

/// Errors from block operations
#[derive(Debug, Error)]
pub enum BlockError {
    /// An account cannot block itself
    #[error("Cannot block yourself")]
    SelfBlock,

    /// No account with that id
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    /// This ordered pair is already blocked
    #[error("Account is already blocked")]
    AlreadyBlocked,

    /// No block exists between the pair
    #[error("No block exists between these accounts")]
    NotBlocked,

    /// Only the account that placed a block may lift it
    #[error("Only the original blocker can remove this block")]
    NotBlockOwner,

    /// Storage failure
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl BlockError {
    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockError::SelfBlock => ErrorKind::Validation,
            BlockError::AccountNotFound(_) => ErrorKind::NotFound,
            BlockError::AlreadyBlocked => ErrorKind::Conflict,
            BlockError::NotBlocked => ErrorKind::NotFound,
            BlockError::NotBlockOwner => ErrorKind::Forbidden,
            BlockError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for block operations
pub type Result<T> = std::result::Result<T, BlockError>;

/// A block record (ordered pair: blocker → blocked)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    /// Record id
    pub id: i64,
    /// Account that placed the block
    pub blocker_id: i64,
    /// Account being blocked
    pub blocked_id: i64,
    /// Reason supplied by the blocker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl BlockRecord {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            blocker_id: row.try_get("blocker_id")?,
            blocked_id: row.try_get("blocked_id")?,
            reason: row.try_get("reason")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Whether a block exists between two accounts, in either direction
pub async fn block_exists_between<'e, E>(
    executor: E,
    a: i64,
    b: i64,
) -> std::result::Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM blocks
          WHERE (blocker_id = ? AND blocked_id = ?)
             OR (blocker_id = ? AND blocked_id = ?)",
    )
    .bind(a)
    .bind(b)
    .bind(b)
    .bind(a)
    .fetch_one(executor)
    .await?;
    Ok(count > 0)
}

/// Block service
#[derive(Clone)]
pub struct BlockService {
    pool: SqlitePool,
}

impl BlockService {
    /// Create a new block service
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Block an account
    ///
    /// Creates the block and tears down every remaining relationship
    /// between the pair in one transaction: friendship records in either
    /// direction are deleted regardless of state, follow edges go in both
    /// directions, both parties' counters are recounted from the edge set,
    /// and notifications between them are hidden without being deleted.
    ///
    /// # Errors
    ///
    /// - `BlockError::SelfBlock` - blocker and blocked are the same account
    /// - `BlockError::AccountNotFound` - either account is missing
    /// - `BlockError::AlreadyBlocked` - this ordered pair is already blocked
    pub async fn block(
        &self,
        blocker_id: i64,
        blocked_id: i64,
        reason: Option<&str>,
    ) -> Result<BlockRecord> {
        if blocker_id == blocked_id {
            return Err(BlockError::SelfBlock);
        }
        for id in [blocker_id, blocked_id] {
            Account::fetch(&self.pool, id)
                .await?
                .ok_or(BlockError::AccountNotFound(id))?;
        }

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO blocks (blocker_id, blocked_id, reason, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await;

        let block_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e)
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false) =>
            {
                return Err(BlockError::AlreadyBlocked);
            }
            Err(e) => return Err(e.into()),
        };

        sqlx::query(
            "DELETE FROM friendships
              WHERE (requester_id = ? AND receiver_id = ?)
                 OR (requester_id = ? AND receiver_id = ?)",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(blocked_id)
        .bind(blocker_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM follows
              WHERE (follower_id = ? AND followed_id = ?)
                 OR (follower_id = ? AND followed_id = ?)",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(blocked_id)
        .bind(blocker_id)
        .execute(&mut *tx)
        .await?;

        recompute_counts(&mut *tx, blocker_id).await?;
        recompute_counts(&mut *tx, blocked_id).await?;

        notifications::hide_between(&mut *tx, blocker_id, blocked_id).await?;

        tx.commit().await?;

        tracing::info!(blocker_id, blocked_id, "block created, relationships torn down");

        let row = sqlx::query("SELECT * FROM blocks WHERE id = ?")
            .bind(block_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(BlockRecord::from_row(&row)?)
    }

    /// Remove a block
    ///
    /// Only the account that placed the block may lift it; the blocked
    /// party attempting to unblock themselves is rejected.
    pub async fn unblock(&self, caller_id: i64, other_id: i64) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM blocks WHERE blocker_id = ? AND blocked_id = ?",
        )
        .bind(caller_id)
        .bind(other_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(blocker_id = caller_id, blocked_id = other_id, "block removed");
            return Ok(());
        }

        // Distinguish "no block at all" from "you are not the blocker".
        let reverse: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM blocks WHERE blocker_id = ? AND blocked_id = ?",
        )
        .bind(other_id)
        .bind(caller_id)
        .fetch_one(&self.pool)
        .await?;

        if reverse > 0 {
            Err(BlockError::NotBlockOwner)
        } else {
            Err(BlockError::NotBlocked)
        }
    }

    /// Whether a block exists between two accounts, in either direction
    pub async fn is_blocked_between(&self, a: i64, b: i64) -> Result<bool> {
        Ok(block_exists_between(&self.pool, a, b).await?)
    }

    /// All blocks placed by an account
    pub async fn blocks_of(&self, blocker_id: i64) -> Result<Vec<BlockRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM blocks WHERE blocker_id = ? ORDER BY id ASC",
        )
        .bind(blocker_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| BlockRecord::from_row(r).map_err(BlockError::from))
            .collect()
    }
}
