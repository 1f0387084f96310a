// Translation of actions into `input` / `monkey` shell commands.
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::accessibility::provider::ScrollDirection;
use crate::executor::text_input::input_text_command;
use crate::intent::types::{Action, ActionKind};

const SWIPE_DURATION_MS: u32 = 300;

/// Well-known launcher labels for stock apps.
const APP_ALIASES: &[(&str, &str)] = &[
    ("settings", "com.android.settings"),
    ("chrome", "com.android.chrome"),
    ("play store", "com.android.vending"),
    ("contacts", "com.android.contacts"),
    ("phone", "com.android.dialer"),
    ("messages", "com.google.android.apps.messaging"),
    ("calculator", "com.google.android.calculator"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

fn package_name() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)+$").ok())
        .as_ref()
}

/// Resolve a navigate target to a package identifier.
pub fn resolve_package(target: &str) -> Option<String> {
    let target = target.trim();
    if package_name().is_some_and(|re| re.is_match(target)) {
        return Some(target.to_string());
    }
    let lower = target.to_lowercase();
    APP_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, pkg)| pkg.to_string())
}

/// Build the shell command line for `action`.
pub fn command_for(action: &Action, screen: ScreenSize) -> DroidClawResult<String> {
    match action.kind {
        ActionKind::Click => {
            let (x, y) = action.coordinates.ok_or_else(|| {
                DroidClawError::Dispatch(format!(
                    "click on '{}' needs coordinates on the shell backend",
                    action.target
                ))
            })?;
            Ok(format!("input tap {} {}", x.round() as i32, y.round() as i32))
        }
        ActionKind::Type => input_text_command(&action.target),
        ActionKind::Scroll => {
            let direction = ScrollDirection::parse(&action.target).ok_or_else(|| {
                DroidClawError::Dispatch(format!(
                    "unrecognized scroll direction '{}'",
                    action.target
                ))
            })?;
            let x = screen.width / 2;
            let upper = screen.height * 3 / 10;
            let lower = screen.height * 7 / 10;
            // Content follows the finger: swiping down reveals what is above.
            let (from, to) = match direction {
                ScrollDirection::Backward => (upper, lower),
                ScrollDirection::Forward => (lower, upper),
            };
            Ok(format!("input swipe {x} {from} {x} {to} {SWIPE_DURATION_MS}"))
        }
        ActionKind::Navigate => {
            let package = resolve_package(&action.target).ok_or_else(|| {
                DroidClawError::Dispatch(format!(
                    "no package identifier known for '{}'",
                    action.target
                ))
            })?;
            Ok(format!(
                "monkey -p {package} -c android.intent.category.LAUNCHER 1"
            ))
        }
    }
}
