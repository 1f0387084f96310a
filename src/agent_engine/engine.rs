use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::agent_engine::event_bus::{SessionBus, SessionView};
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::state::{Author, Message, MessageStatus, SessionState};
use crate::executor::backend::ActionExecutor;
use crate::intent::interpreter::IntentParser;
use crate::perception::frame_source::FrameProvider;

pub const PROCESSING_TEXT: &str = "Processing...";
pub const AUTOMATION_NOT_ENABLED: &str =
    "Automation not enabled. Enable the accessibility service or configure the shell backend.";

/// Drives one instruction at a time through capture, interpretation and
/// execution, and publishes the message log for the presentation layer.
///
/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    bus: SessionBus,
    parser: Arc<IntentParser>,
    frames: Option<Arc<dyn FrameProvider>>,
    executor: Mutex<Option<Arc<dyn ActionExecutor>>>,
    history: Option<SessionHistory>,
    torn_down: AtomicBool,
}

/// Returns the session to idle when the pipeline task ends, however it ends.
struct IdleGuard(Arc<Inner>);

impl Drop for IdleGuard {
    fn drop(&mut self) {
        self.0.bus.state.send_replace(SessionState::Idle);
        self.0.bus.is_processing.send_replace(false);
    }
}

impl SessionOrchestrator {
    pub fn new(
        parser: Arc<IntentParser>,
        frames: Option<Arc<dyn FrameProvider>>,
        history: Option<SessionHistory>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                bus: SessionBus::new(),
                parser,
                frames,
                executor: Mutex::new(None),
                history,
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe(&self) -> SessionView {
        self.inner.bus.subscribe()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.bus.messages.borrow().clone()
    }

    pub fn is_processing(&self) -> bool {
        *self.inner.bus.is_processing.borrow()
    }

    pub fn state(&self) -> SessionState {
        *self.inner.bus.state.borrow()
    }

    pub fn on_input_changed(&self, text: impl Into<String>) {
        self.inner.bus.input_text.send_replace(text.into());
    }

    /// Attach or detach the execution backend.
    pub async fn set_executor(&self, executor: Option<Arc<dyn ActionExecutor>>) {
        match &executor {
            Some(e) => tracing::info!(backend = e.name(), "executor attached"),
            None => tracing::info!("executor detached"),
        }
        *self.inner.executor.lock().await = executor;
    }

    /// Submit the current input buffer as an instruction.
    ///
    /// Returns `None` without side effects when the input is blank or an
    /// instruction is already in flight. Otherwise returns the handle of
    /// the spawned pipeline task.
    pub fn send_message(&self) -> Option<JoinHandle<()>> {
        let bus = &self.inner.bus;
        let text = bus.input_text.borrow().trim().to_string();
        if text.is_empty() {
            return None;
        }

        let claimed = bus.is_processing.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        if !claimed {
            tracing::debug!("instruction already in flight; submit ignored");
            return None;
        }

        self.inner
            .push_message(Message::new(text.clone(), Author::User, MessageStatus::Sent));
        bus.input_text.send_replace(String::new());
        let placeholder = Message::new(PROCESSING_TEXT, Author::System, MessageStatus::Processing);
        let id = placeholder.id;
        self.inner.push_message(placeholder);
        bus.state.send_replace(SessionState::Processing);
        tracing::info!(instruction = %text, "instruction submitted");

        let inner = self.inner.clone();
        Some(tokio::spawn(async move {
            let _idle = IdleGuard(inner.clone());
            let worker = tokio::spawn(run_pipeline(inner.clone(), text.clone(), id));
            if let Err(e) = worker.await {
                let detail = join_error_detail(e);
                tracing::error!(error = %detail, "pipeline aborted");
                inner.finish(
                    id,
                    &text,
                    MessageStatus::Error,
                    Some(format!("Error: {detail}")),
                    SessionState::Error,
                );
            }
        }))
    }

    /// Convenience for hosts that do not keep a separate input buffer.
    pub fn submit(&self, text: impl Into<String>) -> Option<JoinHandle<()>> {
        self.on_input_changed(text);
        self.send_message()
    }

    /// Empty the message log. Updates from an instruction still in flight
    /// target messages that no longer exist and are dropped.
    pub fn clear_chat(&self) {
        self.inner.bus.messages.send_replace(Vec::new());
        tracing::info!("chat cleared");
    }

    /// Release the frame source and the executor. Idempotent.
    pub async fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(frames) = &self.inner.frames {
            frames.release().await;
        }
        if let Some(executor) = self.inner.executor.lock().await.take() {
            executor.release().await;
        }
        tracing::info!("session torn down");
    }
}

impl Inner {
    fn push_message(&self, message: Message) {
        self.bus.messages.send_modify(|log| log.push(message));
    }

    /// Apply `f` to the message with `id`, if it is still in the log.
    fn update_message(&self, id: Uuid, f: impl FnOnce(&mut Message)) -> Option<Message> {
        let mut updated = None;
        self.bus.messages.send_if_modified(|log| match log.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                f(m);
                updated = Some(m.clone());
                true
            }
            None => false,
        });
        updated
    }

    fn finish(
        &self,
        id: Uuid,
        instruction: &str,
        status: MessageStatus,
        text: Option<String>,
        state: SessionState,
    ) {
        let updated = self.update_message(id, |m| {
            m.status = status;
            if let Some(text) = text {
                m.text = text;
            }
        });
        self.bus.state.send_replace(state);
        tracing::info!(status = ?status, "instruction finished");

        if let (Some(history), Some(message)) = (&self.history, updated) {
            if let Err(e) = history.record(instruction, &message) {
                tracing::warn!(error = %e, "failed to write session history");
            }
        }
    }
}

async fn run_pipeline(inner: Arc<Inner>, instruction: String, id: Uuid) {
    let frame = match &inner.frames {
        Some(frames) => match frames.capture().await {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "no screenshot available; continuing without one");
                None
            }
        },
        None => None,
    };

    let intent = inner.parser.interpret(&instruction, frame.as_ref()).await;
    drop(frame);

    if intent.is_error() {
        inner.finish(
            id,
            &instruction,
            MessageStatus::Error,
            Some(intent.message),
            SessionState::Error,
        );
        return;
    }

    let executor = inner.executor.lock().await.clone();
    let Some(executor) = executor.filter(|e| e.is_ready()) else {
        inner.finish(
            id,
            &instruction,
            MessageStatus::Error,
            Some(AUTOMATION_NOT_ENABLED.to_string()),
            SessionState::NoExecutor,
        );
        return;
    };

    inner.update_message(id, |m| {
        m.status = MessageStatus::ActionInProgress;
        m.text = intent.message.clone();
    });
    inner.bus.state.send_replace(SessionState::ActionInProgress);

    let Some(action) = intent.action else {
        tracing::info!("intent carries no action; nothing to execute");
        return;
    };

    tracing::info!(backend = executor.name(), kind = %action.kind, target = %action.target, "executing action");
    let (status, text, state) = match executor.perform(&action).await {
        Ok(result) if result.succeeded => (
            MessageStatus::ActionCompleted,
            intent.message,
            SessionState::ActionCompleted,
        ),
        Ok(result) => (
            MessageStatus::ActionFailed,
            with_diagnostic(
                &intent.message,
                result.detail.as_deref().unwrap_or("action did not take effect"),
            ),
            SessionState::ActionFailed,
        ),
        Err(e) => (
            MessageStatus::ActionFailed,
            with_diagnostic(&intent.message, &e.to_string()),
            SessionState::ActionFailed,
        ),
    };
    inner.finish(id, &instruction, status, Some(text), state);
}

fn with_diagnostic(message: &str, detail: &str) -> String {
    if message.is_empty() {
        format!("Action failed: {detail}")
    } else {
        format!("{message}\nAction failed: {detail}")
    }
}

fn join_error_detail(e: JoinError) -> String {
    if !e.is_panic() {
        return "pipeline cancelled".to_string();
    }
    let payload: Box<dyn Any + Send> = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pipeline panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::UnknownActionPolicy;
    use crate::executor::accessibility::executor::AccessibilityExecutor;
    use crate::executor::accessibility::tree::{Bounds, TreeEvent, TreeEventKind, UiNode, UiTree};
    use crate::executor::backend::{ExecutionResult, ExecutionSettings};
    use crate::intent::interpreter::ParserOptions;
    use crate::perception::frame::Frame;
    use crate::test_support::{FakeTree, FixedFrames, Scripted, ScriptedExecutor, ScriptedReasoner};

    const OPEN_SETTINGS: &str = r#"{"type":"NAVIGATE","message":"Opening Settings","action":{"type":"NAVIGATE","target":"Settings"}}"#;

    fn orchestrator(reasoner: Arc<ScriptedReasoner>, frames: Option<Arc<dyn FrameProvider>>) -> SessionOrchestrator {
        let parser = IntentParser::new(
            reasoner,
            ParserOptions {
                timeout: Duration::from_secs(2),
                unknown_action: UnknownActionPolicy::Drop,
            },
        );
        SessionOrchestrator::new(Arc::new(parser), frames, None)
    }

    fn fast_settings() -> ExecutionSettings {
        ExecutionSettings {
            max_attempts: 3,
            retry_delay: Duration::from_millis(5),
            verify_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(5),
            tap_duration: Duration::from_millis(100),
        }
    }

    fn launcher() -> UiTree {
        let mut tree = UiTree::new(UiNode {
            handle: 1,
            bounds: Bounds::new(0, 0, 1080, 2400),
            ..UiNode::default()
        });
        tree.add_child(
            0,
            UiNode {
                handle: 2,
                text: Some("Settings".into()),
                clickable: true,
                bounds: Bounds::new(100, 200, 300, 400),
                ..UiNode::default()
            },
        );
        tree
    }

    fn placeholder(session: &SessionOrchestrator) -> Message {
        session
            .messages()
            .into_iter()
            .find(|m| m.author == Author::System)
            .unwrap()
    }

    async fn run(session: &SessionOrchestrator, text: &str) {
        session.submit(text).unwrap().await.unwrap();
    }

    #[tokio::test]
    async fn open_settings_end_to_end() {
        let reasoner = Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS));
        let session = orchestrator(reasoner.clone(), None);
        let tree = Arc::new(FakeTree::new(launcher()));
        tree.confirm_on_attempt(1, TreeEvent::new(TreeEventKind::WindowStateChanged, "Settings"));
        session
            .set_executor(Some(Arc::new(AccessibilityExecutor::new(tree.clone(), fast_settings()))))
            .await;

        run(&session, "open Settings").await;

        let log = session.messages();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].author, Author::User);
        assert_eq!(log[0].status, MessageStatus::Sent);
        assert_eq!(log[1].status, MessageStatus::ActionCompleted);
        assert_eq!(log[1].text, "Opening Settings");
        assert_eq!(tree.taps(), vec![(200.0, 300.0)]);
        assert!(!session.is_processing());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.subscribe().input_text().is_empty());
        assert!(!reasoner.prompts()[0].1);
    }

    #[tokio::test]
    async fn second_submit_while_processing_is_ignored() {
        let (reasoner, gate) = ScriptedReasoner::gated(OPEN_SETTINGS);
        let reasoner = Arc::new(reasoner);
        let session = orchestrator(reasoner.clone(), None);
        session.set_executor(Some(Arc::new(ScriptedExecutor::succeeding()))).await;

        let first = session.submit("open Settings").unwrap();
        assert!(session.is_processing());
        assert!(session.submit("open Chrome").is_none());

        gate.notify_one();
        first.await.unwrap();

        assert_eq!(reasoner.prompts().len(), 1);
        assert_eq!(session.messages().len(), 2);
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let session = orchestrator(Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)), None);
        assert!(session.submit("   ").is_none());
        assert!(session.messages().is_empty());
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn every_outcome_reaches_one_terminal_status() {
        let failing = ExecutionResult::failure("tap gesture rejected");
        let cases: Vec<(Arc<ScriptedReasoner>, Option<ScriptedExecutor>, MessageStatus)> = vec![
            (
                Arc::new(ScriptedReasoner::replying("no json here")),
                Some(ScriptedExecutor::succeeding()),
                MessageStatus::Error,
            ),
            (
                Arc::new(ScriptedReasoner::failing("connection refused")),
                Some(ScriptedExecutor::succeeding()),
                MessageStatus::Error,
            ),
            (Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)), None, MessageStatus::Error),
            (
                Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)),
                Some(ScriptedExecutor::succeeding()),
                MessageStatus::ActionCompleted,
            ),
            (
                Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)),
                Some(ScriptedExecutor::new(vec![Scripted::Result(failing)])),
                MessageStatus::ActionFailed,
            ),
            (
                Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)),
                Some(ScriptedExecutor::new(vec![Scripted::Error("shell died".into())])),
                MessageStatus::ActionFailed,
            ),
            (
                Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)),
                Some(ScriptedExecutor::new(vec![Scripted::Panic])),
                MessageStatus::Error,
            ),
        ];

        for (reasoner, executor, expected) in cases {
            let session = orchestrator(reasoner, None);
            if let Some(executor) = executor {
                session.set_executor(Some(Arc::new(executor))).await;
            }
            run(&session, "open Settings").await;

            let msg = placeholder(&session);
            assert_eq!(msg.status, expected, "message: {}", msg.text);
            assert!(msg.status.is_terminal());
            assert!(!session.is_processing());
        }
    }

    #[tokio::test]
    async fn failure_detail_is_appended_to_message() {
        let session = orchestrator(Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)), None);
        session
            .set_executor(Some(Arc::new(ScriptedExecutor::new(vec![Scripted::Result(
                ExecutionResult::failure("no interactive element matching 'Settings'"),
            )]))))
            .await;
        run(&session, "open Settings").await;

        let msg = placeholder(&session);
        assert_eq!(msg.status, MessageStatus::ActionFailed);
        assert!(msg.text.starts_with("Opening Settings"));
        assert!(msg.text.contains("no interactive element"));
    }

    #[tokio::test]
    async fn panic_in_backend_becomes_error_message() {
        let session = orchestrator(Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)), None);
        session
            .set_executor(Some(Arc::new(ScriptedExecutor::new(vec![Scripted::Panic]))))
            .await;
        run(&session, "open Settings").await;

        let msg = placeholder(&session);
        assert_eq!(msg.status, MessageStatus::Error);
        assert!(msg.text.contains("executor exploded"));
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn missing_or_unready_executor_reports_automation_disabled() {
        let session = orchestrator(Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)), None);
        run(&session, "open Settings").await;
        assert!(placeholder(&session).text.starts_with("Automation not enabled"));

        let executor = Arc::new(ScriptedExecutor::not_ready());
        session.clear_chat();
        session.set_executor(Some(executor.clone())).await;
        run(&session, "open Settings").await;
        assert_eq!(placeholder(&session).status, MessageStatus::Error);
        assert!(executor.performed().is_empty());
    }

    #[tokio::test]
    async fn action_less_intent_stays_informational() {
        let reasoner = Arc::new(ScriptedReasoner::replying(
            r#"{"type":"SCROLL","message":"Which way should I scroll?"}"#,
        ));
        let session = orchestrator(reasoner, None);
        let executor = Arc::new(ScriptedExecutor::succeeding());
        session.set_executor(Some(executor.clone())).await;
        run(&session, "scroll").await;

        let msg = placeholder(&session);
        assert_eq!(msg.status, MessageStatus::ActionInProgress);
        assert_eq!(msg.text, "Which way should I scroll?");
        assert!(executor.performed().is_empty());
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn third_attempt_success_completes_and_three_failures_fail() {
        for (confirm_on, expected) in [
            (Some(3), MessageStatus::ActionCompleted),
            (None, MessageStatus::ActionFailed),
        ] {
            let session = orchestrator(Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)), None);
            let tree = Arc::new(FakeTree::new(launcher()));
            if let Some(n) = confirm_on {
                tree.confirm_on_attempt(n, TreeEvent::new(TreeEventKind::WindowStateChanged, "Settings"));
            }
            session
                .set_executor(Some(Arc::new(AccessibilityExecutor::new(tree.clone(), fast_settings()))))
                .await;
            run(&session, "open Settings").await;

            assert_eq!(placeholder(&session).status, expected);
            assert_eq!(tree.taps().len(), 3);
        }
    }

    #[tokio::test]
    async fn clear_chat_empties_log_even_mid_flight() {
        let (reasoner, gate) = ScriptedReasoner::gated(OPEN_SETTINGS);
        let session = orchestrator(Arc::new(reasoner), None);
        session.set_executor(Some(Arc::new(ScriptedExecutor::succeeding()))).await;

        session.clear_chat();
        assert!(session.messages().is_empty());

        let handle = session.submit("open Settings").unwrap();
        session.clear_chat();
        gate.notify_one();
        handle.await.unwrap();

        assert!(session.messages().is_empty());
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn capture_failure_falls_back_to_text_prompt() {
        let reasoner = Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS));
        let session = orchestrator(reasoner.clone(), Some(Arc::new(FixedFrames::failing())));
        run(&session, "open Settings").await;
        assert!(!reasoner.prompts()[0].1);

        let reasoner = Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS));
        let frame = Frame::from_rgba(image::RgbaImage::new(4, 4));
        let session = orchestrator(reasoner.clone(), Some(Arc::new(FixedFrames::returning(frame))));
        run(&session, "open Settings").await;
        assert!(reasoner.prompts()[0].1);
    }

    #[tokio::test]
    async fn teardown_releases_resources_once() {
        let frames = FixedFrames::failing();
        let frames_released = frames.released();
        let executor = ScriptedExecutor::succeeding();
        let executor_released = executor.released();

        let session = orchestrator(
            Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)),
            Some(Arc::new(frames)),
        );
        session.set_executor(Some(Arc::new(executor))).await;

        session.teardown().await;
        session.teardown().await;

        assert_eq!(frames_released.load(Ordering::SeqCst), 1);
        assert_eq!(executor_released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn history_records_terminal_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let history = SessionHistory::new(Some(dir.path())).unwrap();
        let path = history.path().to_path_buf();
        let parser = IntentParser::new(
            Arc::new(ScriptedReasoner::replying(OPEN_SETTINGS)),
            ParserOptions::default(),
        );
        let session = SessionOrchestrator::new(Arc::new(parser), None, Some(history));
        session.set_executor(Some(Arc::new(ScriptedExecutor::succeeding()))).await;
        run(&session, "open Settings").await;

        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("action_completed"));
    }
}
