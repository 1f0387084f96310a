use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ExecutorConfig;
use crate::errors::DroidClawResult;
use crate::intent::types::Action;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub detail: Option<String>,
}

impl ExecutionResult {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            detail: None,
        }
    }

    pub fn success_with(detail: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            detail: Some(detail.into()),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            detail: Some(detail.into()),
        }
    }
}

/// A backend that can carry out one `Action` on the device.
///
/// Exactly one backend is chosen per deployment; the orchestrator only sees
/// this trait.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend can currently accept actions.
    fn is_ready(&self) -> bool {
        true
    }

    /// Perform `action`. An `Err` means the backend itself broke; an
    /// unsuccessful `ExecutionResult` means the action did not take effect.
    async fn perform(&self, action: &Action) -> DroidClawResult<ExecutionResult>;

    /// Free backend resources. Idempotent.
    async fn release(&self) {}
}

/// Timing knobs shared by the backends.
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub verify_timeout: Duration,
    pub poll_interval: Duration,
    pub tap_duration: Duration,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self::from(&ExecutorConfig::default())
    }
}

impl From<&ExecutorConfig> for ExecutionSettings {
    fn from(cfg: &ExecutorConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            verify_timeout: Duration::from_millis(cfg.verify_timeout_ms),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(1)),
            tap_duration: Duration::from_millis(cfg.tap_duration_ms),
        }
    }
}
