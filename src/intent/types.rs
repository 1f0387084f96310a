use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    Navigate,
    Click,
    Type,
    Scroll,
    Error,
}

impl IntentKind {
    /// Case-insensitive match against the wire names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NAVIGATE" => Some(Self::Navigate),
            "CLICK" => Some(Self::Click),
            "TYPE" => Some(Self::Type),
            "SCROLL" => Some(Self::Scroll),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Navigate,
    Click,
    Type,
    Scroll,
}

impl ActionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NAVIGATE" => Some(Self::Navigate),
            "CLICK" => Some(Self::Click),
            "TYPE" => Some(Self::Type),
            "SCROLL" => Some(Self::Scroll),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Navigate => "NAVIGATE",
            Self::Click => "CLICK",
            Self::Type => "TYPE",
            Self::Scroll => "SCROLL",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single UI operation extracted from the reasoning reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// App name, visible label, text to type, or `UP`/`DOWN` for scrolls.
    pub target: String,
    /// Screen position, only meaningful for clicks.
    pub coordinates: Option<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub message: String,
    pub action: Option<Action>,
}

impl Intent {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::Error,
            message: message.into(),
            action: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == IntentKind::Error
    }
}
