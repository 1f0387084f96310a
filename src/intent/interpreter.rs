use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::{AppConfig, UnknownActionPolicy};
use crate::errors::{DroidClawError, DroidClawResult};
use crate::intent::parser::parse_reply;
use crate::intent::prompt::{build_text_prompt, build_vision_prompt};
use crate::intent::types::Intent;
use crate::llm::registry::{ProviderRegistry, Role};
use crate::llm::types::{ChatMessage, ContentPart, ImageUrl, MessageContent};
use crate::perception::frame::Frame;

/// The external reasoning service: prompt (+ optional frame) in, free text out.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn generate(&self, prompt: &str, frame: Option<&Frame>) -> DroidClawResult<String>;
}

/// Reasoning client backed by the configured LLM providers.
/// Text-only prompts go to the `text` role, framed prompts to `vision`.
pub struct LlmReasoner {
    registry: Arc<Mutex<ProviderRegistry>>,
}

impl LlmReasoner {
    pub fn new(registry: Arc<Mutex<ProviderRegistry>>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ReasoningClient for LlmReasoner {
    async fn generate(&self, prompt: &str, frame: Option<&Frame>) -> DroidClawResult<String> {
        let role = if frame.is_some() { Role::Vision } else { Role::Text };
        let (provider, cfg) = {
            let reg = self.registry.lock().await;
            reg.call_config_for_role(role)?
        };

        let content = match frame {
            Some(frame) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: prompt.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: frame.to_data_url()?,
                    },
                },
            ]),
            None => MessageContent::Text(prompt.to_string()),
        };

        let response = provider.chat(vec![ChatMessage::user(content)], &cfg).await?;
        if response.content.trim().is_empty() {
            return Err(DroidClawError::LlmProvider("empty reply from reasoning service".into()));
        }
        Ok(response.content)
    }
}

#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Deadline for one reasoning call.
    pub timeout: Duration,
    pub unknown_action: UnknownActionPolicy,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ParserOptions {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(cfg.generation.timeout_secs),
            unknown_action: cfg.parser.unknown_action_type,
        }
    }
}

/// Turns an instruction (and optionally the current frame) into an `Intent`.
pub struct IntentParser {
    client: Arc<dyn ReasoningClient>,
    options: ParserOptions,
}

impl IntentParser {
    pub fn new(client: Arc<dyn ReasoningClient>, options: ParserOptions) -> Self {
        Self { client, options }
    }

    /// Never fails; every problem is folded into an `Error` intent.
    pub async fn interpret(&self, instruction: &str, frame: Option<&Frame>) -> Intent {
        let prompt = match frame {
            Some(f) => build_vision_prompt(instruction, f.width(), f.height()),
            None => build_text_prompt(instruction),
        };
        tracing::info!(instruction = %instruction, with_frame = frame.is_some(), "interpreting instruction");

        let reply = match tokio::time::timeout(
            self.options.timeout,
            self.client.generate(&prompt, frame),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "reasoning call failed");
                return Intent::error(format!("Error processing command: {e}"));
            }
            Err(_) => {
                let e = DroidClawError::ReasoningTimeout(self.options.timeout.as_secs());
                tracing::error!(error = %e, "reasoning call timed out");
                return Intent::error(format!("Error processing command: {e}"));
            }
        };

        let intent = parse_reply(&reply, self.options.unknown_action);
        tracing::info!(
            kind = ?intent.kind,
            action = ?intent.action.as_ref().map(|a| a.kind),
            "instruction interpreted"
        );
        intent
    }
}
