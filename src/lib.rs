pub mod agent_engine;
pub mod commands;
pub mod config;
pub mod errors;
pub mod executor;
pub mod intent;
pub mod llm;
pub mod perception;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::agent_engine::engine::SessionOrchestrator;
use crate::agent_engine::event_bus::SessionView;
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::state::{Message, MessageStatus};
use crate::commands::ChatCommand;
use crate::config::AppConfig;
use crate::errors::DroidClawResult;
use crate::executor::dispatcher::select_backend;
use crate::intent::interpreter::{IntentParser, LlmReasoner, ParserOptions};
use crate::llm::registry::ProviderRegistry;
use crate::perception::adb_screencap::AdbScreencapSurface;
use crate::perception::frame_source::{CaptureSettings, FrameProvider, FrameSource};
use crate::perception::types::CaptureSpec;

const PRINTER_DRAIN: Duration = Duration::from_secs(1);

/// Entry point of the bundled CLI host: wires a session from config and
/// feeds it instructions from stdin until EOF or `/quit`.
pub async fn run() -> DroidClawResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cfg = config::load_config()?;
    let session = build_session(&cfg).await?;

    let printer = tokio::spawn(print_updates(session.subscribe(), |line| println!("{line}")));
    println!("droidclaw {} ready. Type an instruction, /status, /clear or /quit.", commands::version());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = None;
    while let Some(line) = lines.next_line().await? {
        match commands::parse_line(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Quit => break,
            ChatCommand::Clear => session.clear_chat(),
            ChatCommand::Status => println!("{}", commands::status_line(&session)),
            ChatCommand::Instruction(text) => match session.submit(text) {
                Some(handle) => in_flight = Some(handle),
                None => println!("busy: wait for the current instruction to finish"),
            },
        }
    }

    if let Some(handle) = in_flight {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "pipeline task did not finish cleanly");
        }
    }
    session.teardown().await;
    // Closing the last sender lets the printer drain the final update and exit.
    drop(session);
    if tokio::time::timeout(PRINTER_DRAIN, printer).await.is_err() {
        tracing::debug!("message printer did not finish in time");
    }
    Ok(())
}

async fn build_session(cfg: &AppConfig) -> DroidClawResult<SessionOrchestrator> {
    let registry = ProviderRegistry::from_config(cfg);
    tracing::info!(providers = ?registry.list_names(), "LLM registry ready");
    let reasoner = LlmReasoner::new(Arc::new(Mutex::new(registry)));
    let parser = IntentParser::new(Arc::new(reasoner), ParserOptions::from(cfg));

    let frames: Option<Arc<dyn FrameProvider>> = if cfg.capture.enabled {
        let source = FrameSource::new(CaptureSettings::from(&cfg.capture));
        let surface = AdbScreencapSurface::new(cfg.capture.adb_serial.clone());
        source
            .initialize(CaptureSpec::from(&cfg.capture), Box::new(surface))
            .await;
        Some(Arc::new(source))
    } else {
        tracing::info!("screen capture disabled; instructions are sent without a frame");
        None
    };

    let history = if cfg.history.enabled {
        match SessionHistory::new(cfg.history.dir.as_deref()) {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!(error = %e, "session history unavailable");
                None
            }
        }
    } else {
        None
    };

    let session = SessionOrchestrator::new(Arc::new(parser), frames, history);
    // The CLI host has no accessibility service of its own.
    match select_backend(&cfg.executor, None) {
        Ok(executor) => session.set_executor(executor).await,
        Err(e) => tracing::error!(error = %e, "failed to start execution backend"),
    }
    Ok(session)
}

/// Print each message whenever its status or text changes. Returns once
/// the session is dropped, after printing whatever was last published.
async fn print_updates(mut view: SessionView, mut emit: impl FnMut(String) + Send) {
    let mut seen: HashMap<Uuid, (MessageStatus, String)> = HashMap::new();
    while view.messages.changed().await.is_ok() {
        let log = view.messages.borrow_and_update().clone();
        print_changes(&log, &mut seen, &mut emit);
    }
    let log = view.messages.borrow().clone();
    print_changes(&log, &mut seen, &mut emit);
}

fn print_changes(
    log: &[Message],
    seen: &mut HashMap<Uuid, (MessageStatus, String)>,
    emit: &mut impl FnMut(String),
) {
    if log.is_empty() {
        if !seen.is_empty() {
            emit("(chat cleared)".to_string());
        }
        seen.clear();
        return;
    }
    for message in log {
        let current = (message.status, message.text.clone());
        if seen.get(&message.id) != Some(&current) {
            emit(commands::render_message(message));
            seen.insert(message.id, current);
        }
    }
}
