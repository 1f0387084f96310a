use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::DroidClawResult;
use crate::executor::accessibility::tree::{TreeEvent, UiNode, UiTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Towards the start of the content (`UP`).
    Backward,
    /// Towards the end of the content (`DOWN`).
    Forward,
}

impl ScrollDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UP" => Some(Self::Backward),
            "DOWN" => Some(Self::Forward),
            _ => None,
        }
    }
}

/// The platform accessibility layer, as seen by the tree backend.
///
/// Implemented by the host (for example an accessibility service bridge);
/// the crate only consumes it.
#[async_trait]
pub trait AccessibilityProvider: Send + Sync {
    /// Snapshot of the active window, `None` when no window is available.
    async fn snapshot(&self) -> DroidClawResult<Option<UiTree>>;

    /// Stream of tree-change notifications.
    fn subscribe(&self) -> broadcast::Receiver<TreeEvent>;

    /// Dispatch a single-point tap gesture. `Ok(false)` if the gesture was rejected.
    async fn dispatch_tap(&self, x: f32, y: f32, duration: Duration) -> DroidClawResult<bool>;

    async fn set_text(&self, node: &UiNode, text: &str) -> DroidClawResult<bool>;

    async fn scroll(&self, node: &UiNode, direction: ScrollDirection) -> DroidClawResult<bool>;
}
