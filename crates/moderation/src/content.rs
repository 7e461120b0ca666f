//! External content collaborator
//!
//! The content store (songs, albums, playlists, comments) lives outside
//! this subsystem. Moderation needs exactly two things from it: who owns a
//! piece of content (for the self-report check and removal notices) and a
//! hard delete (for the `remove_content` resolution action).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Kind of content a report can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// A single track
    Song,
    /// An album
    Album,
    /// A playlist
    Playlist,
    /// An account
    User,
    /// A comment
    Comment,
}

impl ContentType {
    /// Stable string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Song => "song",
            ContentType::Album => "album",
            ContentType::Playlist => "playlist",
            ContentType::User => "user",
            ContentType::Comment => "comment",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "song" => Ok(ContentType::Song),
            "album" => Ok(ContentType::Album),
            "playlist" => Ok(ContentType::Playlist),
            "user" => Ok(ContentType::User),
            "comment" => Ok(ContentType::Comment),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the content collaborator
#[derive(Debug, Error)]
pub enum ContentStoreError {
    /// The referenced content does not exist
    #[error("Content not found: {content_type} {content_id}")]
    NotFound {
        /// Kind of content
        content_type: ContentType,
        /// Content id
        content_id: i64,
    },

    /// The collaborator could not be reached or failed internally
    #[error("Content store unavailable: {0}")]
    Unavailable(String),
}

/// Interface to the external content store
///
/// Ownership semantics differ per content type: songs and albums list every
/// credited artist, a playlist has its creator, a comment its author. For
/// `user` content the subsystem compares account ids directly and never
/// calls the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Accounts that own the given content
    async fn owner_of(
        &self,
        content_type: ContentType,
        content_id: i64,
    ) -> Result<Vec<i64>, ContentStoreError>;

    /// Permanently delete the given content
    async fn hard_delete(
        &self,
        content_type: ContentType,
        content_id: i64,
    ) -> Result<(), ContentStoreError>;
}
