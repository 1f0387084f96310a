const RESPONSE_SCHEMA: &str = r#"{
  "type": "NAVIGATE" | "CLICK" | "TYPE" | "SCROLL" | "ERROR",
  "message": "<short explanation shown to the user>",
  "action": {
    "type": "NAVIGATE" | "CLICK" | "TYPE" | "SCROLL",
    "target": "<app name, visible label, text to type, or UP/DOWN>",
    "coordinates": [x, y]
  }
}"#;

const TEXT_PREAMBLE: &str = "\
You are DroidClaw, an assistant that operates an Android phone on the user's behalf.
Decide which single UI action fulfils the user's command.";

const VISION_PREAMBLE: &str = "\
You are DroidClaw, an assistant that operates an Android phone on the user's behalf.
A screenshot of the current screen is attached. Decide which single UI action fulfils
the user's command, using only elements that are visible in the screenshot.";

const RULES: &str = "\
Rules:
- Reply with ONE JSON object and nothing else: no prose, no code fences.
- Use NAVIGATE with the app name as target to open an app.
- Use TYPE with the exact text to enter as target.
- Use SCROLL with target UP or DOWN.
- Omit \"action\" when no UI action is needed; use type ERROR when the command cannot be done.";

const VISION_RULES: &str = "\
- The target must be the label exactly as it appears on screen.
- For CLICK, set coordinates to the pixel centre of the element in the screenshot.";

/// Prompt for an instruction with no screenshot attached.
pub fn build_text_prompt(instruction: &str) -> String {
    format!(
        "{TEXT_PREAMBLE}\n\nCommand: {instruction}\n\n{RULES}\n\nResponse schema (coordinates optional):\n{RESPONSE_SCHEMA}"
    )
}

/// Prompt for an instruction that comes with a screenshot.
pub fn build_vision_prompt(instruction: &str, width: u32, height: u32) -> String {
    format!(
        "{VISION_PREAMBLE}\n\nScreenshot size: {width}x{height} pixels.\nCommand: {instruction}\n\n{RULES}\n{VISION_RULES}\n\nResponse schema:\n{RESPONSE_SCHEMA}"
    )
}
