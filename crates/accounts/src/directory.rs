//! Admin directory
//!
//! Enumeration of active moderation staff. The report router balances new
//! caseload against this listing, and reassignment validates its target
//! here. Enumeration order (ascending id) is the tie-break order for
//! assignment.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use storage::ErrorKind;

/// Errors from directory lookups
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Storage failure
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl DirectoryError {
    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectoryError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for directory operations
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// An active admin as seen by the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSummary {
    /// Account id
    pub id: i64,
    /// Handle
    pub handle: String,
}

/// Directory of moderation staff
#[derive(Clone)]
pub struct AdminDirectory {
    pool: SqlitePool,
}

impl AdminDirectory {
    /// Create a new directory over the shared pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All active accounts with role `admin`, in enumeration (id) order
    ///
    /// Super admins supervise and carry no caseload, so they are not
    /// listed here.
    pub async fn active_admins(&self) -> Result<Vec<AdminSummary>> {
        let rows = sqlx::query(
            "SELECT id, handle FROM users
              WHERE role = 'admin' AND is_active = 1
              ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| AdminSummary {
                id: r.get("id"),
                handle: r.get("handle"),
            })
            .collect())
    }

    /// Whether the account is active staff (admin or super_admin)
    pub async fn is_active_moderator(&self, user_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users
              WHERE id = ? AND is_active = 1 AND role IN ('admin', 'super_admin')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::roles::Role;

    #[tokio::test]
    async fn test_active_admins_excludes_users_and_super_admins() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();

        Account::create(pool, "listener", Role::User).await.unwrap();
        let a1 = Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        let a2 = Account::create(pool, "mod-b", Role::Admin).await.unwrap();
        Account::create(pool, "root", Role::SuperAdmin).await.unwrap();

        let directory = AdminDirectory::new(pool.clone());
        let admins = directory.active_admins().await.unwrap();

        assert_eq!(admins.len(), 2);
        assert_eq!(admins[0].id, a1.id);
        assert_eq!(admins[1].id, a2.id);
    }

    #[tokio::test]
    async fn test_inactive_admins_are_excluded() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();

        let admin = Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(admin.id)
            .execute(pool)
            .await
            .unwrap();

        let directory = AdminDirectory::new(pool.clone());
        assert!(directory.active_admins().await.unwrap().is_empty());
        assert!(!directory.is_active_moderator(admin.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_active_moderator() {
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();

        let user = Account::create(pool, "listener", Role::User).await.unwrap();
        let admin = Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        let root = Account::create(pool, "root", Role::SuperAdmin).await.unwrap();

        let directory = AdminDirectory::new(pool.clone());
        assert!(!directory.is_active_moderator(user.id).await.unwrap());
        assert!(directory.is_active_moderator(admin.id).await.unwrap());
        assert!(directory.is_active_moderator(root.id).await.unwrap());
        assert!(!directory.is_active_moderator(999).await.unwrap());
    }

    #[tokio::test]
    async fn test_banned_admin_is_not_active() {
        // A banned account has is_active = 0, which removes it from the
        // caseload rotation without touching the role column.
        let db = storage::open_in_memory().await.unwrap();
        let pool = db.pool();

        let admin = Account::create(pool, "mod-a", Role::Admin).await.unwrap();
        sqlx::query("UPDATE users SET is_active = 0, is_banned = 1 WHERE id = ?")
            .bind(admin.id)
            .execute(pool)
            .await
            .unwrap();

        let directory = AdminDirectory::new(pool.clone());
        assert!(directory.active_admins().await.unwrap().is_empty());
        assert!(!directory.is_active_moderator(admin.id).await.unwrap());
    }
}
