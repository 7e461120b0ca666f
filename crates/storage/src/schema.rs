//! Subsystem schema
//!
//! Versioned DDL for the trust & moderation tables. One statement per
//! migration; [`crate::SqliteDatabase::migrate`] applies them in order and
//! records checksums.
//!
//! Two constraints here carry correctness weight rather than being plain
//! lookups:
//!
//! - `idx_reports_active_content` is a partial unique index over
//!   `(content_type, content_id)` limited to active statuses. Two racing
//!   submissions for the same content cannot both pass the
//!   "no active report" read; the second insert fails with a unique
//!   violation and intake maps it to a conflict.
//! - `follows`, `friendships`, and `blocks` carry pair uniqueness so edge
//!   duplication is impossible regardless of application-level checks.

use crate::database::MigrationDefinition;

/// All migrations for the trust & moderation schema, in order.
pub fn migrations() -> Vec<MigrationDefinition> {
    vec![
        MigrationDefinition::new(
            1,
            "accounts",
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                handle TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'user',
                is_active INTEGER NOT NULL DEFAULT 1,
                is_banned INTEGER NOT NULL DEFAULT 0,
                ban_reason TEXT,
                is_suspended INTEGER NOT NULL DEFAULT 0,
                suspended_until TEXT,
                suspension_reason TEXT,
                lives INTEGER NOT NULL DEFAULT 3 CHECK (lives BETWEEN 0 AND 10),
                can_upload INTEGER NOT NULL DEFAULT 1,
                follower_count INTEGER NOT NULL DEFAULT 0,
                following_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        ),
        MigrationDefinition::new(
            2,
            "conduct history",
            "CREATE TABLE conduct_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                action TEXT NOT NULL,
                reason TEXT NOT NULL,
                moderator_id INTEGER REFERENCES users(id),
                lives_remaining INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
        ),
        MigrationDefinition::new(
            3,
            "reports",
            "CREATE TABLE reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reporter_id INTEGER NOT NULL REFERENCES users(id),
                content_type TEXT NOT NULL,
                content_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                priority TEXT NOT NULL DEFAULT 'medium',
                assigned_admin_id INTEGER REFERENCES users(id),
                resolution_action TEXT,
                resolution_note TEXT,
                resolved_by INTEGER REFERENCES users(id),
                resolved_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        ),
        MigrationDefinition::new(
            4,
            "one active investigation per content item",
            "CREATE UNIQUE INDEX idx_reports_active_content
                ON reports (content_type, content_id)
                WHERE status IN ('pending', 'in_review')",
        ),
        MigrationDefinition::new(
            5,
            "caseload lookups",
            "CREATE INDEX idx_reports_assigned_active
                ON reports (assigned_admin_id)
                WHERE status IN ('pending', 'in_review')",
        ),
        MigrationDefinition::new(
            6,
            "follow edges",
            "CREATE TABLE follows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                follower_id INTEGER NOT NULL REFERENCES users(id),
                followed_id INTEGER NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                UNIQUE (follower_id, followed_id)
            )",
        ),
        MigrationDefinition::new(
            7,
            "friendships",
            "CREATE TABLE friendships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                requester_id INTEGER NOT NULL REFERENCES users(id),
                receiver_id INTEGER NOT NULL REFERENCES users(id),
                state TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (requester_id, receiver_id)
            )",
        ),
        MigrationDefinition::new(
            8,
            "blocks",
            "CREATE TABLE blocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                blocker_id INTEGER NOT NULL REFERENCES users(id),
                blocked_id INTEGER NOT NULL REFERENCES users(id),
                reason TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (blocker_id, blocked_id)
            )",
        ),
        MigrationDefinition::new(
            9,
            "notifications",
            "CREATE TABLE notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                target_id INTEGER NOT NULL REFERENCES users(id),
                source_id INTEGER REFERENCES users(id),
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                resource_type TEXT,
                resource_id INTEGER,
                is_read INTEGER NOT NULL DEFAULT 0,
                is_hidden INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        ),
    ]
}
