use crate::agent_engine::engine::SessionOrchestrator;
use crate::agent_engine::state::{Author, Message, MessageStatus};

/// One line typed into the bundled CLI host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Instruction(String),
    Clear,
    Status,
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> ChatCommand {
    let line = line.trim();
    match line {
        "" => ChatCommand::Empty,
        "/clear" => ChatCommand::Clear,
        "/status" => ChatCommand::Status,
        "/quit" | "/exit" => ChatCommand::Quit,
        other => ChatCommand::Instruction(other.to_string()),
    }
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn status_line(session: &SessionOrchestrator) -> String {
    format!(
        "droidclaw {} | state: {:?} | processing: {} | messages: {}",
        version(),
        session.state(),
        session.is_processing(),
        session.messages().len()
    )
}

pub fn render_message(message: &Message) -> String {
    let who = match message.author {
        Author::User => "you",
        Author::System => "droidclaw",
    };
    let tag = match message.status {
        MessageStatus::Sent => "sent",
        MessageStatus::Processing => "...",
        MessageStatus::Error => "error",
        MessageStatus::ActionInProgress => "running",
        MessageStatus::ActionCompleted => "done",
        MessageStatus::ActionFailed => "failed",
    };
    format!(
        "[{}] {who} ({tag}): {}",
        message.created_at.format("%H:%M:%S"),
        message.text
    )
}
