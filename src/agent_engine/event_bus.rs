use tokio::sync::watch;

use crate::agent_engine::state::{Message, SessionState};

/// Writer half of the observable session streams. Owned by the orchestrator.
pub(crate) struct SessionBus {
    pub messages: watch::Sender<Vec<Message>>,
    pub input_text: watch::Sender<String>,
    pub is_processing: watch::Sender<bool>,
    pub state: watch::Sender<SessionState>,
}

impl SessionBus {
    pub fn new() -> Self {
        Self {
            messages: watch::channel(Vec::new()).0,
            input_text: watch::channel(String::new()).0,
            is_processing: watch::channel(false).0,
            state: watch::channel(SessionState::Idle).0,
        }
    }

    pub fn subscribe(&self) -> SessionView {
        SessionView {
            messages: self.messages.subscribe(),
            input_text: self.input_text.subscribe(),
            is_processing: self.is_processing.subscribe(),
            state: self.state.subscribe(),
        }
    }
}

/// Read-only view for the presentation layer. Every `borrow()` is a
/// consistent snapshot; the log is only ever replaced as a whole.
#[derive(Clone)]
pub struct SessionView {
    pub messages: watch::Receiver<Vec<Message>>,
    pub input_text: watch::Receiver<String>,
    pub is_processing: watch::Receiver<bool>,
    pub state: watch::Receiver<SessionState>,
}

impl SessionView {
    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn input_text(&self) -> String {
        self.input_text.borrow().clone()
    }

    pub fn is_processing(&self) -> bool {
        *self.is_processing.borrow()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }
}
