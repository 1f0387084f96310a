// Deployment-time backend selection.
use std::sync::Arc;

use crate::config::{BackendKind, ExecutorConfig};
use crate::errors::DroidClawResult;
use crate::executor::accessibility::executor::AccessibilityExecutor;
use crate::executor::accessibility::provider::AccessibilityProvider;
use crate::executor::backend::{ActionExecutor, ExecutionSettings};
use crate::executor::input::ScreenSize;
use crate::executor::shell::{ProcessShell, ShellExecutor};

/// Build the configured backend.
///
/// The accessibility backend needs a tree provider from the host; when none
/// is supplied the session runs without automation (`Ok(None)`).
pub fn select_backend(
    cfg: &ExecutorConfig,
    tree_provider: Option<Arc<dyn AccessibilityProvider>>,
) -> DroidClawResult<Option<Arc<dyn ActionExecutor>>> {
    match cfg.backend {
        BackendKind::Accessibility => match tree_provider {
            Some(provider) => {
                tracing::info!("using accessibility backend");
                let executor = AccessibilityExecutor::new(provider, ExecutionSettings::from(cfg));
                Ok(Some(Arc::new(executor)))
            }
            None => {
                tracing::warn!("accessibility backend selected but no tree provider is available");
                Ok(None)
            }
        },
        BackendKind::Shell => {
            let shell = ProcessShell::spawn(&cfg.shell_command)?;
            let screen = ScreenSize {
                width: cfg.screen_width,
                height: cfg.screen_height,
            };
            tracing::info!("using privileged shell backend (actions are not verified)");
            Ok(Some(Arc::new(ShellExecutor::new(Box::new(shell), screen))))
        }
        BackendKind::None => {
            tracing::info!("automation disabled by configuration");
            Ok(None)
        }
    }
}
