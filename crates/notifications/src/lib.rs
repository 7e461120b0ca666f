//! Notifications for the Fermata trust & moderation subsystem
//!
//! Notification records carry a kind, a human-readable message, and an
//! optional resource reference. Two flags shape visibility: `is_read` is
//! the usual unread marker, and `is_hidden` is set retroactively between
//! two parties when a block lands between them. Hidden notifications stay
//! on disk (history is preserved) but are never surfaced by the read
//! queries.

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::str::FromStr;
use thiserror::Error;

use storage::ErrorKind;

/// Maximum notifications returned per listing
const PAGE_SIZE: i64 = 50;

/// Errors from notification operations
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No such notification for that recipient
    #[error("Notification not found: {0}")]
    NotFound(i64),

    /// Storage failure
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl NotificationError {
    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            NotificationError::NotFound(_) => ErrorKind::NotFound,
            NotificationError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for notification operations
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Types of notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// A moderation decision concerning the recipient
    Moderation,
    /// The recipient's content was removed after review
    ContentRemoved,
    /// Someone followed the recipient
    Follow,
    /// Someone sent the recipient a friend request
    FriendRequest,
    /// A friend request the recipient sent was accepted
    FriendAccepted,
    /// Platform announcement
    System,
}

impl NotificationKind {
    /// Stable string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Moderation => "moderation",
            NotificationKind::ContentRemoved => "content-removed",
            NotificationKind::Follow => "follow",
            NotificationKind::FriendRequest => "friend-request",
            NotificationKind::FriendAccepted => "friend-accepted",
            NotificationKind::System => "system",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "moderation" => Ok(NotificationKind::Moderation),
            "content-removed" => Ok(NotificationKind::ContentRemoved),
            "follow" => Ok(NotificationKind::Follow),
            "friend-request" => Ok(NotificationKind::FriendRequest),
            "friend-accepted" => Ok(NotificationKind::FriendAccepted),
            "system" => Ok(NotificationKind::System),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// Reference to the resource a notification is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    /// Resource type, e.g. `song` or `playlist`
    pub kind: String,
    /// Resource id
    pub id: i64,
}

/// A notification record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Notification id
    pub id: i64,
    /// Recipient
    pub target_id: i64,
    /// Originating account; `None` means the system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
    /// Kind
    pub kind: NotificationKind,
    /// Human-readable message
    pub message: String,
    /// Resource the notification is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
    /// Whether the recipient has read it
    pub is_read: bool,
    /// Hidden between blocked parties; never surfaced, never deleted
    pub is_hidden: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let kind_str: String = row.try_get("kind")?;
        let kind = NotificationKind::from_str(&kind_str).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "kind".to_string(),
                source: e.into(),
            }
        })?;

        let resource_type: Option<String> = row.try_get("resource_type")?;
        let resource_id: Option<i64> = row.try_get("resource_id")?;
        let resource = match (resource_type, resource_id) {
            (Some(kind), Some(id)) => Some(ResourceRef { kind, id }),
            _ => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            target_id: row.try_get("target_id")?,
            source_id: row.try_get("source_id")?,
            kind,
            message: row.try_get("message")?,
            resource,
            is_read: row.try_get("is_read")?,
            is_hidden: row.try_get("is_hidden")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Hide every notification between two parties, in both directions
///
/// Generic over the executor so the block consistency engine can run this
/// inside its teardown transaction. Returns the number of rows hidden.
pub async fn hide_between<'e, E>(
    executor: E,
    user_a: i64,
    user_b: i64,
) -> std::result::Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        "UPDATE notifications SET is_hidden = 1
          WHERE (target_id = ? AND source_id = ?)
             OR (target_id = ? AND source_id = ?)",
    )
    .bind(user_a)
    .bind(user_b)
    .bind(user_b)
    .bind(user_a)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    pool: SqlitePool,
}

impl NotificationService {
    /// Create a new notification service
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a notification
    ///
    /// # Arguments
    ///
    /// * `target_id` - Recipient account
    /// * `source_id` - Originating account, or `None` for the system
    /// * `kind` - Notification kind
    /// * `message` - Human-readable message
    /// * `resource` - Resource the notification is about, if any
    pub async fn create(
        &self,
        target_id: i64,
        source_id: Option<i64>,
        kind: NotificationKind,
        message: &str,
        resource: Option<ResourceRef>,
    ) -> Result<Notification> {
        let result = sqlx::query(
            "INSERT INTO notifications
                (target_id, source_id, kind, message, resource_type, resource_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(target_id)
        .bind(source_id)
        .bind(kind.as_str())
        .bind(message)
        .bind(resource.as_ref().map(|r| r.kind.clone()))
        .bind(resource.as_ref().map(|r| r.id))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_rowid()).await
    }

    /// Fetch a notification by id
    pub async fn get(&self, id: i64) -> Result<Notification> {
        let row = sqlx::query("SELECT * FROM notifications WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(NotificationError::NotFound(id))?;
        Ok(Notification::from_row(&row)?)
    }

    /// Visible notifications for a recipient, newest first
    pub async fn list_visible(&self, target_id: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT * FROM notifications
              WHERE target_id = ? AND is_hidden = 0
              ORDER BY id DESC
              LIMIT ?",
        )
        .bind(target_id)
        .bind(PAGE_SIZE)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| Notification::from_row(r).map_err(NotificationError::from))
            .collect()
    }

    /// Count of unread, visible notifications for a recipient
    pub async fn unread_count(&self, target_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications
              WHERE target_id = ? AND is_read = 0 AND is_hidden = 0",
        )
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Mark one of the recipient's notifications as read
    pub async fn mark_read(&self, id: i64, target_id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND target_id = ?",
        )
        .bind(id)
        .bind(target_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NotificationError::NotFound(id));
        }
        Ok(())
    }

    /// Hide all notifications between two parties, in both directions
    pub async fn hide_between(&self, user_a: i64, user_b: i64) -> Result<u64> {
        let hidden = hide_between(&self.pool, user_a, user_b).await?;
        tracing::debug!(user_a, user_b, hidden, "notifications hidden between parties");
        Ok(hidden)
    }
}
