use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{DroidClawError, DroidClawResult};
use crate::intent::types::ActionKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    /// Optional API key stored in config.toml (falls back to env var DROIDCLAW_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Used when no frame accompanies the instruction.
    pub text: Option<RoleEntry>,
    /// Image-understanding model, used when a frame is attached.
    pub vision: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub stream: bool,
}

/// Fixed sampling parameters sent with every reasoning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_k: Option<u32>,
    pub top_p: Option<f64>,
    pub max_tokens: u32,
    /// Hard deadline for a single reasoning call.
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: Some(40),
            top_p: Some(0.95),
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub density_dpi: u32,
    pub read_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub adb_serial: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            width: 1080,
            height: 2400,
            density_dpi: 420,
            read_timeout_ms: 1000,
            max_attempts: 3,
            retry_delay_ms: 500,
            adb_serial: None,
        }
    }
}

impl CaptureConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Accessibility,
    Shell,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub backend: BackendKind,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Verification window after a dispatched action.
    pub verify_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub tap_duration_ms: u64,
    /// Privileged shell to spawn for the shell backend.
    pub shell_command: Vec<String>,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Accessibility,
            max_attempts: 3,
            retry_delay_ms: 500,
            verify_timeout_ms: 5000,
            poll_interval_ms: 100,
            tap_duration_ms: 100,
            shell_command: vec!["adb".into(), "shell".into()],
            screen_width: 1080,
            screen_height: 2400,
        }
    }
}

/// What to do with an `action.type` the parser does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownActionPolicy {
    #[default]
    Drop,
    Navigate,
    Click,
    Type,
    Scroll,
}

impl UnknownActionPolicy {
    pub fn fallback_kind(self) -> Option<ActionKind> {
        match self {
            Self::Drop => None,
            Self::Navigate => Some(ActionKind::Navigate),
            Self::Click => Some(ActionKind::Click),
            Self::Type => Some(ActionKind::Type),
            Self::Scroll => Some(ActionKind::Scroll),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub unknown_action_type: UnknownActionPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in working directory");
            return Some(candidate);
        }
    }

    let candidate = dirs::config_dir()?.join("droidclaw").join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in user config dir");
        return Some(candidate);
    }
    None
}

/// Loads `config.toml` from the usual locations, or defaults when none exists.
pub fn load_config() -> DroidClawResult<AppConfig> {
    match resolve_config_path() {
        Some(path) => load_config_from(&path),
        None => {
            tracing::warn!("config.toml not found; using built-in defaults");
            Ok(AppConfig::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> DroidClawResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    validate(&config)?;
    tracing::info!(
        path = %path.display(),
        provider = %config.llm.active_provider,
        backend = ?config.executor.backend,
        "config loaded"
    );
    Ok(config)
}

fn validate(config: &AppConfig) -> DroidClawResult<()> {
    if config.capture.max_attempts == 0 || config.executor.max_attempts == 0 {
        return Err(DroidClawError::Config("max_attempts must be at least 1".into()));
    }
    if config.executor.backend == BackendKind::Shell && config.executor.shell_command.is_empty() {
        return Err(DroidClawError::Config(
            "executor.shell_command is empty but the shell backend is selected".into(),
        ));
    }
    Ok(())
}
