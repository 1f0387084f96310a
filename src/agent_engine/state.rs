use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    System,
}

/// Per-message pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Processing,
    Error,
    ActionInProgress,
    ActionCompleted,
    ActionFailed,
}

impl MessageStatus {
    /// Statuses a placeholder can end its instruction in.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageStatus::Error | MessageStatus::ActionCompleted | MessageStatus::ActionFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    pub fn new(text: impl Into<String>, author: Author, status: MessageStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            author,
            created_at: Utc::now(),
            status,
        }
    }
}

/// Lifecycle of the instruction currently (or last) in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Processing,
    Error,
    NoExecutor,
    ActionInProgress,
    ActionCompleted,
    ActionFailed,
}
