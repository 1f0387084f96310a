use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::Instant;

use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::accessibility::provider::{AccessibilityProvider, ScrollDirection};
use crate::executor::accessibility::tree::{TreeEvent, UiTree};
use crate::executor::backend::{ActionExecutor, ExecutionResult, ExecutionSettings};
use crate::intent::types::{Action, ActionKind};

/// Clears the in-progress flag however the attempt ends.
struct InProgressGuard<'a>(&'a AtomicBool);

impl<'a> InProgressGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Tree backend: finds elements by their visible text, taps them through
/// gestures and confirms the result from tree-change events.
pub struct AccessibilityExecutor {
    provider: Arc<dyn AccessibilityProvider>,
    settings: ExecutionSettings,
    in_progress: AtomicBool,
}

impl AccessibilityExecutor {
    pub fn new(provider: Arc<dyn AccessibilityProvider>, settings: ExecutionSettings) -> Self {
        Self {
            provider,
            settings,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_action_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    async fn attempt(&self, action: &Action) -> DroidClawResult<()> {
        // Subscribe before dispatching so no confirming event is missed.
        let mut events = self.provider.subscribe();

        let tree = self
            .provider
            .snapshot()
            .await?
            .ok_or_else(|| DroidClawError::Dispatch("no active window".into()))?;

        match action.kind {
            ActionKind::Navigate | ActionKind::Click => self.tap_by_text(&tree, &action.target).await?,
            ActionKind::Type => self.type_into_editable(&tree, &action.target).await?,
            ActionKind::Scroll => {
                self.scroll_root(&tree, &action.target).await?;
                // Scrolling has no reliable post-condition.
                return Ok(());
            }
        }

        self.verify(action, &mut events).await
    }

    async fn tap_by_text(&self, tree: &UiTree, target: &str) -> DroidClawResult<()> {
        let matches = tree.find_by_text(target);
        let Some(id) = matches.into_iter().find(|&id| tree.is_actionable(id)) else {
            return Err(DroidClawError::Dispatch(format!(
                "no interactive element matching '{target}'"
            )));
        };

        let (x, y) = tree.node(id).bounds.center();
        tracing::debug!(target = %target, x, y, "tapping element");
        if self
            .provider
            .dispatch_tap(x, y, self.settings.tap_duration)
            .await?
        {
            Ok(())
        } else {
            Err(DroidClawError::Dispatch("tap gesture rejected".into()))
        }
    }

    async fn type_into_editable(&self, tree: &UiTree, text: &str) -> DroidClawResult<()> {
        let id = tree
            .find_editable()
            .ok_or_else(|| DroidClawError::Dispatch("no editable field on screen".into()))?;
        if self.provider.set_text(tree.node(id), text).await? {
            Ok(())
        } else {
            Err(DroidClawError::Dispatch("set-text rejected".into()))
        }
    }

    async fn scroll_root(&self, tree: &UiTree, target: &str) -> DroidClawResult<()> {
        let direction = ScrollDirection::parse(target).ok_or_else(|| {
            DroidClawError::Dispatch(format!("unrecognized scroll direction '{target}'"))
        })?;
        if self
            .provider
            .scroll(tree.node(tree.root()), direction)
            .await?
        {
            Ok(())
        } else {
            Err(DroidClawError::Dispatch("scroll rejected".into()))
        }
    }

    /// Watch tree events for the verification window; on timeout fall back
    /// to one more look at the tree.
    async fn verify(
        &self,
        action: &Action,
        events: &mut broadcast::Receiver<TreeEvent>,
    ) -> DroidClawResult<()> {
        let deadline = Instant::now() + self.settings.verify_timeout;
        loop {
            loop {
                match events.try_recv() {
                    Ok(event) if event.confirms(&action.target) => {
                        tracing::debug!(kind = ?event.kind, "action confirmed by tree event");
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(TryRecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "tree event receiver lagged");
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        let tree = self.provider.snapshot().await?;
        let still_visible = tree.as_ref().is_some_and(|t| t.contains_text(&action.target));
        let done = match action.kind {
            // Typed text showing up in the tree is the success signal.
            ActionKind::Type => still_visible,
            // The tapped label still on screen means nothing happened.
            _ => !still_visible,
        };
        if done {
            tracing::debug!(kind = %action.kind, "action confirmed by tree re-query");
            Ok(())
        } else {
            Err(DroidClawError::VerificationTimeout(format!(
                "no confirmation for '{}' within {}ms",
                action.target,
                self.settings.verify_timeout.as_millis()
            )))
        }
    }
}

#[async_trait]
impl ActionExecutor for AccessibilityExecutor {
    fn name(&self) -> &'static str {
        "accessibility"
    }

    async fn perform(&self, action: &Action) -> DroidClawResult<ExecutionResult> {
        if action.kind == ActionKind::Scroll && ScrollDirection::parse(&action.target).is_none() {
            return Ok(ExecutionResult::failure(format!(
                "unrecognized scroll direction '{}'",
                action.target
            )));
        }

        let max_attempts = self.settings.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let outcome = {
                let _guard = InProgressGuard::enter(&self.in_progress);
                self.attempt(action).await
            };
            match outcome {
                Ok(()) => {
                    tracing::info!(kind = %action.kind, target = %action.target, attempt, "action completed");
                    return Ok(ExecutionResult::success());
                }
                Err(e) => {
                    tracing::warn!(kind = %action.kind, target = %action.target, attempt, error = %e, "action attempt failed");
                    last_error = e.to_string();
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        Ok(ExecutionResult::failure(format!(
            "{} '{}' failed after {max_attempts} attempts: {last_error}",
            action.kind, action.target
        )))
    }
}
