//! Conversation history records.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// A turn to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub user_id: Option<String>,
    pub user_text: String,
    pub reply: String,
    pub meta: serde_json::Value,
}

/// A persisted turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLog {
    pub id: i64,
    pub user_id: Option<String>,
    pub user_text: String,
    pub reply: String,
    pub meta: serde_json::Value,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

/// Write-mostly store for chat turns.
pub trait ChatLogStore: Send + Sync {
    fn save(&self, entry: &ChatLogEntry) -> Result<i64>;

    /// Most recent entries, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<ChatLog>>;
}
