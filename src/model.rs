use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationStatus {
    NotOptimized,
    Pending,
    Optimized,
}

impl OptimizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStatus::NotOptimized => "NOT_OPTIMIZED",
            OptimizationStatus::Pending => "PENDING",
            OptimizationStatus::Optimized => "OPTIMIZED",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "NOT_OPTIMIZED" => Some(OptimizationStatus::NotOptimized),
            "PENDING" => Some(OptimizationStatus::Pending),
            "OPTIMIZED" => Some(OptimizationStatus::Optimized),
            _ => None,
        }
    }
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media item as reported by the server. Identity is `key` and nothing else.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub key: String,
    pub rating_key: String,
    pub title: String,
    pub kind: MediaKind,
    pub library_section_uuid: Option<String>,
}

impl MediaItem {
    pub fn episode(&self) -> Option<&EpisodeRef> {
        match &self.kind {
            MediaKind::Episode(ep) => Some(ep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Episode(EpisodeRef),
    Other(String),
}

/// Navigation handles for an episode: parent season, grandparent show, and
/// the episode's ordinal position inside its season.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRef {
    pub season_key: String,
    pub show_key: String,
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    pub rating_key: String,
    pub title: String,
    pub index: Option<i64>,
}

/// A server-side account whose on-deck queue can be inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRecord {
    pub key: String,
    pub status: OptimizationStatus,
    pub updated_at: DateTime<Utc>,
}
