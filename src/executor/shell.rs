/// Privileged-shell backend.
///
/// Actions are translated into `input`/`monkey` command lines and written to
/// one long-lived shell process (`adb shell`, or `su` on a rooted device).
/// Success only means the command was written: nothing on screen is checked,
/// so this is a weaker guarantee than the accessibility backend gives.
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;

use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::backend::{ActionExecutor, ExecutionResult};
use crate::executor::input::{command_for, ScreenSize};
use crate::intent::types::Action;

/// Line-oriented command channel into a privileged shell.
#[async_trait]
pub trait ShellChannel: Send {
    /// Write `command` followed by a newline and flush.
    async fn write_line(&mut self, command: &str) -> DroidClawResult<()>;

    async fn close(&mut self);
}

/// A spawned shell process fed through its stdin.
pub struct ProcessShell {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl ProcessShell {
    pub fn spawn(argv: &[String]) -> DroidClawResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| DroidClawError::Config("empty shell command".into()))?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DroidClawError::Shell("shell stdin unavailable".into()))?;
        tracing::info!(command = %argv.join(" "), "privileged shell started");
        Ok(Self {
            child,
            stdin: Some(stdin),
        })
    }
}

#[async_trait]
impl ShellChannel for ProcessShell {
    async fn write_line(&mut self, command: &str) -> DroidClawResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| DroidClawError::Shell("shell already closed".into()))?;
        stdin.write_all(format!("{command}\n").as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn close(&mut self) {
        if self.stdin.take().is_some() {
            if let Err(e) = self.child.kill().await {
                tracing::debug!(error = %e, "shell already exited");
            }
            tracing::info!("privileged shell stopped");
        }
    }
}

pub struct ShellExecutor {
    channel: Mutex<Option<Box<dyn ShellChannel>>>,
    open: AtomicBool,
    screen: ScreenSize,
}

impl ShellExecutor {
    pub fn new(channel: Box<dyn ShellChannel>, screen: ScreenSize) -> Self {
        Self {
            channel: Mutex::new(Some(channel)),
            open: AtomicBool::new(true),
            screen,
        }
    }
}

#[async_trait]
impl ActionExecutor for ShellExecutor {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn is_ready(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn perform(&self, action: &Action) -> DroidClawResult<ExecutionResult> {
        let command = match command_for(action, self.screen) {
            Ok(command) => command,
            Err(e) => return Ok(ExecutionResult::failure(e.to_string())),
        };

        let mut channel = self.channel.lock().await;
        let shell = channel.as_mut().ok_or(DroidClawError::ExecutorUnavailable)?;
        match shell.write_line(&command).await {
            Ok(()) => {
                tracing::info!(kind = %action.kind, command = %command, "shell command sent");
                Ok(ExecutionResult::success_with("command sent (not verified)"))
            }
            Err(e) => {
                tracing::warn!(kind = %action.kind, error = %e, "shell write failed");
                Ok(ExecutionResult::failure(e.to_string()))
            }
        }
    }

    async fn release(&self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(mut shell) = self.channel.lock().await.take() {
            shell.close().await;
        }
    }
}
