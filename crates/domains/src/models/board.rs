use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a single board (e.g., /b/, /v/)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: i64,
    /// Filesystem and URL segment (e.g., "b" for /b/)
    pub dir: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub max_message_length: i64,
    pub created_on: DateTime<Utc>,
}

/// Values needed to create a board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBoard {
    pub dir: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub max_message_length: i64,
}
