// Text preparation for `input text`, which only understands ASCII and
// treats spaces as argument separators.
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{DroidClawError, DroidClawResult};

const SHELL_META: &str = r#"([\\"'`$&|;<>()*?~!#\[\]{}])"#;

fn shell_meta() -> DroidClawResult<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SHELL_META).ok())
        .as_ref()
        .ok_or_else(|| DroidClawError::Dispatch("invalid shell escape pattern".into()))
}

/// Returns true if `input text` can type this string verbatim.
pub fn is_injectable(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}

/// Escape `text` for `input text`: shell metacharacters are backslash-escaped
/// and spaces become `%s`.
pub fn escape_input_text(text: &str) -> DroidClawResult<String> {
    if !is_injectable(text) {
        return Err(DroidClawError::Dispatch(
            "input text only supports printable ASCII".into(),
        ));
    }
    let escaped = shell_meta()?.replace_all(text, r"\$1");
    Ok(escaped.replace(' ', "%s"))
}

/// Shell line typing `text` verbatim.
///
/// `input text` turns every `%s` into a space and has no escape for it, so a
/// literal `%s` is split across two commands: the `%` ends one chunk and the
/// `s` starts the next.
pub fn input_text_command(text: &str) -> DroidClawResult<String> {
    let mut commands = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices("%s") {
        commands.push(format!("input text {}", escape_input_text(&text[start..=idx])?));
        start = idx + 1;
    }
    commands.push(format!("input text {}", escape_input_text(&text[start..])?));
    Ok(commands.join(" && "))
}
