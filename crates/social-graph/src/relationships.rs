//! Follow and friendship edges
//!
//! Edge creation screens for existing blocks in either direction, so the
//! block invariant holds continuously instead of only at teardown time.
//! Counters are recomputed from the edge set after every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::str::FromStr;
use thiserror::Error;

use accounts::Account;
use notifications::{NotificationKind, NotificationService};
use storage::ErrorKind;

use crate::blocking::block_exists_between;

/// Errors from relationship operations
#[derive(Debug, Error)]
pub enum RelationshipError {
    /// An account cannot follow or befriend itself
    #[error("Cannot create a relationship with yourself")]
    SelfRelation,

    /// No account with that id
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    /// A block exists between the two accounts
    #[error("A block exists between these accounts")]
    BlockedPair,

    /// The follow edge already exists
    #[error("Already following this account")]
    AlreadyFollowing,

    /// The follow edge does not exist
    #[error("Not following this account")]
    NotFollowing,

    /// A friendship already exists between the pair
    #[error("A friendship in state '{0}' already exists between these accounts")]
    AlreadyRelated(FriendshipState),

    /// No pending request to respond to
    #[error("No pending friend request from that account")]
    RequestNotFound,

    /// Storage failure
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl RelationshipError {
    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelationshipError::SelfRelation => ErrorKind::Validation,
            RelationshipError::AccountNotFound(_) => ErrorKind::NotFound,
            RelationshipError::BlockedPair => ErrorKind::Forbidden,
            RelationshipError::AlreadyFollowing => ErrorKind::Conflict,
            RelationshipError::NotFollowing => ErrorKind::NotFound,
            RelationshipError::AlreadyRelated(_) => ErrorKind::Conflict,
            RelationshipError::RequestNotFound => ErrorKind::NotFound,
            RelationshipError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for relationship operations
pub type Result<T> = std::result::Result<T, RelationshipError>;

/// State of a friendship record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipState {
    /// Request sent, awaiting a response
    Pending,
    /// Request accepted
    Accepted,
    /// Request declined
    Rejected,
    /// Frozen by a block
    Blocked,
}

impl FriendshipState {
    /// Stable string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipState::Pending => "pending",
            FriendshipState::Accepted => "accepted",
            FriendshipState::Rejected => "rejected",
            FriendshipState::Blocked => "blocked",
        }
    }
}

impl FromStr for FriendshipState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FriendshipState::Pending),
            "accepted" => Ok(FriendshipState::Accepted),
            "rejected" => Ok(FriendshipState::Rejected),
            "blocked" => Ok(FriendshipState::Blocked),
            other => Err(format!("unknown friendship state: {other}")),
        }
    }
}

impl std::fmt::Display for FriendshipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A friendship record between two accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    /// Record id
    pub id: i64,
    /// Account that sent the request
    pub requester_id: i64,
    /// Account that received the request
    pub receiver_id: i64,
    /// Current state
    pub state: FriendshipState,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
}

impl Friendship {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let state_str: String = row.try_get("state")?;
        let state = FriendshipState::from_str(&state_str).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "state".to_string(),
                source: e.into(),
            }
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            requester_id: row.try_get("requester_id")?,
            receiver_id: row.try_get("receiver_id")?,
            state,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn notification_error(e: notifications::NotificationError) -> RelationshipError {
    match e {
        notifications::NotificationError::Storage(s) => RelationshipError::Storage(s),
        notifications::NotificationError::NotFound(id) => RelationshipError::AccountNotFound(id),
    }
}

/// Recompute both counters for one account from the authoritative edge set
///
/// A full recount, never a delta: one statement that also heals any drift
/// left by earlier partial writes. Generic over the executor so the block
/// teardown can run it inside its transaction.
pub async fn recompute_counts<'e, E>(
    executor: E,
    user_id: i64,
) -> std::result::Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "UPDATE users SET
            follower_count = (SELECT COUNT(*) FROM follows WHERE followed_id = users.id),
            following_count = (SELECT COUNT(*) FROM follows WHERE follower_id = users.id)
          WHERE id = ?",
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Follow and friendship service
#[derive(Clone)]
pub struct RelationshipService {
    pool: SqlitePool,
    notifications: NotificationService,
}

impl RelationshipService {
    /// Create a new relationship service
    pub fn new(pool: SqlitePool) -> Self {
        let notifications = NotificationService::new(pool.clone());
        Self {
            pool,
            notifications,
        }
    }

    async fn ensure_account(&self, id: i64) -> Result<Account> {
        Account::fetch(&self.pool, id)
            .await?
            .ok_or(RelationshipError::AccountNotFound(id))
    }

    async fn ensure_unblocked_pair(&self, a: i64, b: i64) -> Result<()> {
        if block_exists_between(&self.pool, a, b).await? {
            return Err(RelationshipError::BlockedPair);
        }
        Ok(())
    }

    // =========================================================================
    // Follows
    // =========================================================================

    /// Create a follow edge and recount both parties
    pub async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<()> {
        if follower_id == followed_id {
            return Err(RelationshipError::SelfRelation);
        }
        self.ensure_account(follower_id).await?;
        let followed = self.ensure_account(followed_id).await?;
        self.ensure_unblocked_pair(follower_id, followed_id).await?;

        let inserted = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e)
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false) =>
            {
                return Err(RelationshipError::AlreadyFollowing);
            }
            Err(e) => return Err(e.into()),
        }

        recompute_counts(&self.pool, follower_id).await?;
        recompute_counts(&self.pool, followed_id).await?;

        self.notifications
            .create(
                followed.id,
                Some(follower_id),
                NotificationKind::Follow,
                "started following you",
                None,
            )
            .await
            .map_err(notification_error)?;

        Ok(())
    }

    /// Remove a follow edge and recount both parties
    pub async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = ? AND followed_id = ?",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RelationshipError::NotFollowing);
        }

        recompute_counts(&self.pool, follower_id).await?;
        recompute_counts(&self.pool, followed_id).await?;
        Ok(())
    }

    /// Whether a follow edge exists
    pub async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followed_id = ?",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Recount one account's counters and return (followers, following)
    pub async fn recompute(&self, user_id: i64) -> Result<(i64, i64)> {
        self.ensure_account(user_id).await?;
        recompute_counts(&self.pool, user_id).await?;

        let row = sqlx::query("SELECT follower_count, following_count FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok((row.get("follower_count"), row.get("following_count")))
    }

    // =========================================================================
    // Friendships
    // =========================================================================

    /// Send a friend request
    ///
    /// A rejected record between the pair is reopened as a fresh pending
    /// request in the new direction; pending and accepted records conflict.
    pub async fn send_friend_request(&self, requester_id: i64, receiver_id: i64) -> Result<Friendship> {
        if requester_id == receiver_id {
            return Err(RelationshipError::SelfRelation);
        }
        self.ensure_account(requester_id).await?;
        self.ensure_account(receiver_id).await?;
        self.ensure_unblocked_pair(requester_id, receiver_id).await?;

        if let Some(existing) = self.friendship_between(requester_id, receiver_id).await? {
            match existing.state {
                FriendshipState::Rejected => {
                    sqlx::query(
                        "UPDATE friendships
                            SET requester_id = ?, receiver_id = ?, state = 'pending', updated_at = ?
                          WHERE id = ?",
                    )
                    .bind(requester_id)
                    .bind(receiver_id)
                    .bind(Utc::now())
                    .bind(existing.id)
                    .execute(&self.pool)
                    .await?;
                }
                state => return Err(RelationshipError::AlreadyRelated(state)),
            }
        } else {
            let now = Utc::now();
            sqlx::query(
                "INSERT INTO friendships (requester_id, receiver_id, state, created_at, updated_at)
                 VALUES (?, ?, 'pending', ?, ?)",
            )
            .bind(requester_id)
            .bind(receiver_id)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        self.notifications
            .create(
                receiver_id,
                Some(requester_id),
                NotificationKind::FriendRequest,
                "sent you a friend request",
                None,
            )
            .await
            .map_err(notification_error)?;

        self.friendship_between(requester_id, receiver_id)
            .await?
            .ok_or(RelationshipError::RequestNotFound)
    }

    /// Accept or reject a pending friend request addressed to `receiver_id`
    pub async fn respond_friend_request(
        &self,
        receiver_id: i64,
        requester_id: i64,
        accept: bool,
    ) -> Result<Friendship> {
        let state = if accept {
            FriendshipState::Accepted
        } else {
            FriendshipState::Rejected
        };

        let result = sqlx::query(
            "UPDATE friendships SET state = ?, updated_at = ?
              WHERE requester_id = ? AND receiver_id = ? AND state = 'pending'",
        )
        .bind(state.as_str())
        .bind(Utc::now())
        .bind(requester_id)
        .bind(receiver_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RelationshipError::RequestNotFound);
        }

        if accept {
            self.notifications
                .create(
                    requester_id,
                    Some(receiver_id),
                    NotificationKind::FriendAccepted,
                    "accepted your friend request",
                    None,
                )
                .await
                .map_err(notification_error)?;
        }

        self.friendship_between(requester_id, receiver_id)
            .await?
            .ok_or(RelationshipError::RequestNotFound)
    }

    /// The friendship record between two accounts, if any, in either direction
    pub async fn friendship_between(&self, a: i64, b: i64) -> Result<Option<Friendship>> {
        let row = sqlx::query(
            "SELECT * FROM friendships
              WHERE (requester_id = ? AND receiver_id = ?)
                 OR (requester_id = ? AND receiver_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Friendship::from_row(&r)).transpose()?)
    }

    /// Whether two accounts are accepted friends
    pub async fn are_friends(&self, a: i64, b: i64) -> Result<bool> {
        Ok(self
            .friendship_between(a, b)
            .await?
            .map(|f| f.state == FriendshipState::Accepted)
            .unwrap_or(false))
    }
}
