//! Scripted stand-ins for the external collaborators, shared by unit tests.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::accessibility::provider::{AccessibilityProvider, ScrollDirection};
use crate::executor::accessibility::tree::{TreeEvent, UiNode, UiTree};
use crate::executor::backend::{ActionExecutor, ExecutionResult};
use crate::executor::shell::ShellChannel;
use crate::intent::interpreter::ReasoningClient;
use crate::intent::types::Action;
use crate::perception::frame::{Frame, RGBA_PIXEL_SIZE};
use crate::perception::frame_source::FrameProvider;
use crate::perception::traits::{CaptureSurface, RawBuffer};

// ── Capture ─────────────────────────────────────────────────────────────────

/// Hands out a fixed sequence of reads; `None` entries are empty reads.
pub struct ScriptedSurface {
    reads: Mutex<VecDeque<Option<RawBuffer>>>,
    calls: Arc<AtomicU32>,
    released: Arc<AtomicU32>,
}

impl ScriptedSurface {
    pub fn new(reads: Vec<Option<RawBuffer>>) -> Self {
        Self {
            reads: Mutex::new(reads.into()),
            calls: Arc::new(AtomicU32::new(0)),
            released: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A `width × height` buffer with `padding` junk bytes after every row.
    pub fn padded(width: u32, height: u32, padding: usize) -> RawBuffer {
        let row_bytes = width as usize * RGBA_PIXEL_SIZE;
        let row_stride = row_bytes + padding;
        let mut data = Vec::with_capacity(row_stride * height as usize);
        for y in 0..height as usize {
            data.extend((0..row_bytes).map(|i| ((y * 31 + i) % 251) as u8));
            data.extend(std::iter::repeat(0xEE).take(padding));
        }
        RawBuffer {
            width,
            height,
            data,
            row_stride,
            pixel_stride: RGBA_PIXEL_SIZE,
        }
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    pub fn released(&self) -> Arc<AtomicU32> {
        self.released.clone()
    }
}

#[async_trait]
impl CaptureSurface for ScriptedSurface {
    async fn acquire_latest(&self, _timeout: Duration) -> DroidClawResult<Option<RawBuffer>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reads.lock().unwrap().pop_front().flatten())
    }

    async fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Frame provider that always returns the same frame, or always times out.
pub struct FixedFrames {
    frame: Option<Frame>,
    released: Arc<AtomicU32>,
}

impl FixedFrames {
    pub fn returning(frame: Frame) -> Self {
        Self {
            frame: Some(frame),
            released: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            frame: None,
            released: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn released(&self) -> Arc<AtomicU32> {
        self.released.clone()
    }
}

#[async_trait]
impl FrameProvider for FixedFrames {
    async fn capture(&self) -> DroidClawResult<Frame> {
        self.frame
            .clone()
            .ok_or(DroidClawError::CaptureTimeout { attempts: 3 })
    }

    async fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Reasoning ───────────────────────────────────────────────────────────────

pub struct ScriptedReasoner {
    reply: Result<String, String>,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    prompts: Mutex<Vec<(String, bool)>>,
}

impl ScriptedReasoner {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: None,
            gate: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            reply: Err(error.to_string()),
            ..Self::replying("")
        }
    }

    /// Replies only after the returned `Notify` fires.
    pub fn gated(reply: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let reasoner = Self {
            gate: Some(gate.clone()),
            ..Self::replying(reply)
        };
        (reasoner, gate)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts seen so far, with whether a frame was attached.
    pub fn prompts(&self) -> Vec<(String, bool)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoner {
    async fn generate(&self, prompt: &str, frame: Option<&Frame>) -> DroidClawResult<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), frame.is_some()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(DroidClawError::LlmProvider)
    }
}

// ── Accessibility tree ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TreeCall {
    SetText(u64, String),
    Scroll(u64, ScrollDirection),
}

struct FakeTreeState {
    tree: UiTree,
    after_dispatch: Option<UiTree>,
    failing_snapshots: u32,
    failing_taps: u32,
    snapshots: u32,
    confirmations: HashMap<u32, TreeEvent>,
    dispatched: u32,
    taps: Vec<(f32, f32)>,
    calls: Vec<TreeCall>,
}

/// In-memory tree provider. Every dispatched action (tap, set-text or
/// scroll) counts as one attempt; a confirming event can be scheduled for
/// any attempt number.
pub struct FakeTree {
    state: Mutex<FakeTreeState>,
    events: broadcast::Sender<TreeEvent>,
}

impl FakeTree {
    pub fn new(tree: UiTree) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(FakeTreeState {
                tree,
                after_dispatch: None,
                failing_snapshots: 0,
                failing_taps: 0,
                snapshots: 0,
                confirmations: HashMap::new(),
                dispatched: 0,
                taps: Vec::new(),
                calls: Vec::new(),
            }),
            events,
        }
    }

    pub fn confirm_on_attempt(&self, attempt: u32, event: TreeEvent) {
        self.state.lock().unwrap().confirmations.insert(attempt, event);
    }

    /// Swap the screen for `tree` once the first action lands.
    pub fn after_dispatch(&self, tree: UiTree) {
        self.state.lock().unwrap().after_dispatch = Some(tree);
    }

    /// The next `n` snapshots fail with a provider error.
    pub fn fail_snapshots(&self, n: u32) {
        self.state.lock().unwrap().failing_snapshots = n;
    }

    /// The next `n` taps fail with a provider error before reaching the screen.
    pub fn fail_taps(&self, n: u32) {
        self.state.lock().unwrap().failing_taps = n;
    }

    pub fn snapshots(&self) -> u32 {
        self.state.lock().unwrap().snapshots
    }

    pub fn taps(&self) -> Vec<(f32, f32)> {
        self.state.lock().unwrap().taps.clone()
    }

    pub fn calls(&self) -> Vec<TreeCall> {
        self.state.lock().unwrap().calls.clone()
    }

    fn dispatched(&self, state: &mut FakeTreeState) {
        if let Some(next) = state.after_dispatch.take() {
            state.tree = next;
        }
        state.dispatched += 1;
        if let Some(event) = state.confirmations.remove(&state.dispatched) {
            let _ = self.events.send(event);
        }
    }
}

#[async_trait]
impl AccessibilityProvider for FakeTree {
    async fn snapshot(&self) -> DroidClawResult<Option<UiTree>> {
        let mut state = self.state.lock().unwrap();
        state.snapshots += 1;
        if state.failing_snapshots > 0 {
            state.failing_snapshots -= 1;
            return Err(DroidClawError::Dispatch("accessibility service disconnected".into()));
        }
        Ok(Some(state.tree.clone()))
    }

    fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    async fn dispatch_tap(&self, x: f32, y: f32, _duration: Duration) -> DroidClawResult<bool> {
        let mut state = self.state.lock().unwrap();
        if state.failing_taps > 0 {
            state.failing_taps -= 1;
            return Err(DroidClawError::Dispatch("gesture dispatch failed".into()));
        }
        state.taps.push((x, y));
        self.dispatched(&mut state);
        Ok(true)
    }

    async fn set_text(&self, node: &UiNode, text: &str) -> DroidClawResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(TreeCall::SetText(node.handle, text.to_string()));
        self.dispatched(&mut state);
        Ok(true)
    }

    async fn scroll(&self, node: &UiNode, direction: ScrollDirection) -> DroidClawResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(TreeCall::Scroll(node.handle, direction));
        self.dispatched(&mut state);
        Ok(true)
    }
}

// ── Shell ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingShell {
    lines: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicU32>,
    broken: bool,
}

impl RecordingShell {
    /// A shell whose pipe is gone: every write fails.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Arc<Mutex<Vec<String>>> {
        self.lines.clone()
    }

    pub fn closed(&self) -> Arc<AtomicU32> {
        self.closed.clone()
    }
}

#[async_trait]
impl ShellChannel for RecordingShell {
    async fn write_line(&mut self, command: &str) -> DroidClawResult<()> {
        if self.broken {
            return Err(DroidClawError::Shell("broken pipe".into()));
        }
        self.lines.lock().unwrap().push(command.to_string());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Executor ────────────────────────────────────────────────────────────────

pub enum Scripted {
    Result(ExecutionResult),
    Error(String),
    Panic,
}

/// Backend returning queued outcomes; succeeds once the queue is empty.
pub struct ScriptedExecutor {
    outcomes: Mutex<VecDeque<Scripted>>,
    ready: AtomicBool,
    performed: Mutex<Vec<Action>>,
    released: Arc<AtomicU32>,
}

impl ScriptedExecutor {
    pub fn new(outcomes: Vec<Scripted>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            ready: AtomicBool::new(true),
            performed: Mutex::new(Vec::new()),
            released: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Vec::new())
    }

    pub fn not_ready() -> Self {
        let executor = Self::succeeding();
        executor.ready.store(false, Ordering::SeqCst);
        executor
    }

    pub fn performed(&self) -> Vec<Action> {
        self.performed.lock().unwrap().clone()
    }

    pub fn released(&self) -> Arc<AtomicU32> {
        self.released.clone()
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn perform(&self, action: &Action) -> DroidClawResult<ExecutionResult> {
        self.performed.lock().unwrap().push(action.clone());
        let next = self.outcomes.lock().unwrap().pop_front();
        match next {
            None => Ok(ExecutionResult::success()),
            Some(Scripted::Result(result)) => Ok(result),
            Some(Scripted::Error(e)) => Err(DroidClawError::Dispatch(e)),
            Some(Scripted::Panic) => panic!("executor exploded"),
        }
    }

    async fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
