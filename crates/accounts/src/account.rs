//! Account model
//!
//! Row mapping for the `users` table. Account creation and profile editing
//! live in the platform's registration service; this subsystem only needs a
//! minimal provisioning hook plus read access to standing fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::str::FromStr;

use crate::roles::Role;

/// Default number of conduct lives for a new account
pub const DEFAULT_LIVES: i64 = 3;

/// Upper bound on the conduct-lives counter
pub const MAX_LIVES: i64 = 10;

/// An account with its standing fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account id
    pub id: i64,
    /// Unique handle
    pub handle: String,
    /// Role
    pub role: Role,
    /// False once the account is disabled (banned or deactivated)
    pub is_active: bool,
    /// Whether the account is banned; banned accounts cannot log in
    pub is_banned: bool,
    /// Reason recorded with the ban
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban_reason: Option<String>,
    /// Whether the account is under suspension
    pub is_suspended: bool,
    /// Suspension deadline; `None` while suspended means indefinite
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended_until: Option<DateTime<Utc>>,
    /// Reason recorded with the suspension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspension_reason: Option<String>,
    /// Conduct lives, 0..=10
    pub lives: i64,
    /// Whether the account may upload content
    pub can_upload: bool,
    /// Follower count, recomputed from the follow edges
    pub follower_count: i64,
    /// Following count, recomputed from the follow edges
    pub following_count: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Map a `users` row onto an [`Account`]
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let role_str: String = row.try_get("role")?;
        let role = Role::from_str(&role_str).map_err(|e| sqlx::Error::ColumnDecode {
            index: "role".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            handle: row.try_get("handle")?,
            role,
            is_active: row.try_get("is_active")?,
            is_banned: row.try_get("is_banned")?,
            ban_reason: row.try_get("ban_reason")?,
            is_suspended: row.try_get("is_suspended")?,
            suspended_until: row.try_get("suspended_until")?,
            suspension_reason: row.try_get("suspension_reason")?,
            lives: row.try_get("lives")?,
            can_upload: row.try_get("can_upload")?,
            follower_count: row.try_get("follower_count")?,
            following_count: row.try_get("following_count")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Fetch an account by id
    pub async fn fetch(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.map(|r| Self::from_row(&r)).transpose()
    }

    /// Provision an account with the given handle and role
    ///
    /// Registration proper (credentials, profile) is handled outside this
    /// subsystem; this hook exists for provisioning and test fixtures.
    pub async fn create(pool: &SqlitePool, handle: &str, role: Role) -> Result<Self, sqlx::Error> {
        let result = sqlx::query("INSERT INTO users (handle, role, created_at) VALUES (?, ?, ?)")
            .bind(handle)
            .bind(role.as_str())
            .bind(Utc::now())
            .execute(pool)
            .await?;

        Self::fetch(pool, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }
}
