use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent_engine::state::{Message, MessageStatus};
use crate::errors::DroidClawResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    pub message_id: String,
    pub instruction: String,
    pub status: MessageStatus,
    pub content: String,
}

/// Append-only JSONL transcript, one line per finished instruction.
pub struct SessionHistory {
    pub session_id: String,
    file_path: PathBuf,
}

impl SessionHistory {
    pub fn new(dir: Option<&Path>) -> DroidClawResult<Self> {
        let dir = match dir {
            Some(d) => d.to_path_buf(),
            None => data_dir_or_cwd(),
        };
        std::fs::create_dir_all(&dir)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        tracing::info!(path = %file_path.display(), "session history enabled");
        Ok(Self {
            session_id,
            file_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn record(&self, instruction: &str, message: &Message) -> DroidClawResult<()> {
        let entry = HistoryEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            message_id: message.id.to_string(),
            instruction: instruction.to_string(),
            status: message.status,
            content: message.text.clone(),
        };
        let line = serde_json::to_string(&entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{line}")?;
        tracing::debug!(path = %self.file_path.display(), "history entry flushed");
        Ok(())
    }
}

/// `<data dir>/droidclaw/sessions`, falling back to the working directory.
fn data_dir_or_cwd() -> PathBuf {
    match dirs::data_local_dir() {
        Some(base) => base.join("droidclaw").join("sessions"),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
