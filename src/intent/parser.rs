/// Tolerant decoding of reasoning-service replies.
///
/// Replies are free text that is supposed to contain a single JSON object.
/// Models routinely wrap it in prose or code fences, so the object is sliced
/// out between the first `{` and the last `}` and decoded field by field,
/// with every missing or unknown value degrading to a documented default.
use serde_json::Value;

use crate::config::UnknownActionPolicy;
use crate::intent::types::{Action, ActionKind, Intent, IntentKind};

pub const NO_JSON_MESSAGE: &str = "no valid JSON found";

/// Slice from the first `{` to the last `}` (inclusive).
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// Decode a raw reply into an `Intent`. Never fails: problems become
/// `IntentKind::Error` with a diagnostic message.
pub fn parse_reply(reply: &str, unknown_action: UnknownActionPolicy) -> Intent {
    let Some(json_str) = extract_json_object(reply) else {
        tracing::warn!(reply_len = reply.len(), "no JSON object in reasoning reply");
        return Intent::error(NO_JSON_MESSAGE);
    };

    let value: Value = match serde_json::from_str(json_str) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "reasoning reply is not valid JSON");
            return Intent::error(format!("Error parsing response: {e}"));
        }
    };
    if !value.is_object() {
        return Intent::error(NO_JSON_MESSAGE);
    }

    let kind = match value["type"].as_str().and_then(IntentKind::parse) {
        Some(kind) => kind,
        None => {
            tracing::warn!(raw = ?value["type"], "missing or unknown intent type; treating as ERROR");
            IntentKind::Error
        }
    };
    let message = value["message"].as_str().map(str::trim).unwrap_or("").to_string();

    if kind == IntentKind::Error {
        let message = if message.is_empty() {
            "The assistant could not interpret this command".to_string()
        } else {
            message
        };
        return Intent::error(message);
    }

    Intent {
        kind,
        message,
        action: decode_action(&value["action"], unknown_action),
    }
}

fn decode_action(raw: &Value, unknown_action: UnknownActionPolicy) -> Option<Action> {
    if !raw.is_object() {
        return None;
    }

    let kind = match raw["type"].as_str() {
        Some(name) => match ActionKind::parse(name) {
            Some(kind) => kind,
            None => {
                let fallback = unknown_action.fallback_kind();
                tracing::warn!(raw = name, ?fallback, "unrecognized action type");
                fallback?
            }
        },
        None => {
            tracing::warn!("action without a type; dropping it");
            return None;
        }
    };

    let Some(target) = raw["target"].as_str().map(str::trim).filter(|t| !t.is_empty()) else {
        tracing::warn!(kind = %kind, "action without a target; dropping it");
        return None;
    };

    Some(Action {
        kind,
        target: target.to_string(),
        coordinates: decode_coordinates(&raw["coordinates"]),
    })
}

fn decode_coordinates(raw: &Value) -> Option<(f32, f32)> {
    let items = raw.as_array()?;
    let x = items.first()?.as_f64()?;
    let y = items.get(1)?.as_f64()?;
    Some((x as f32, y as f32))
}
