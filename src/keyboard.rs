//! Keyboard requests from the agent.
//!
//! One input string is either a named key (`enter`, `ctrl+a`), a hold
//! request (`hold shift, press tab`), a `,`/`;` separated sequence of those,
//! or literal text to type into the focused element.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Agent-facing names and the key (or combination) each one presses.
const SPECIAL_KEYS: &[(&str, &str)] = &[
    ("enter", "Enter"),
    ("tab", "Tab"),
    ("shift+tab", "Shift+Tab"),
    ("backspace", "Backspace"),
    ("escape", "Escape"),
    ("esc", "Escape"),
    ("delete", "Delete"),
    ("del", "Delete"),
    ("space", "Space"),
    ("up", "ArrowUp"),
    ("down", "ArrowDown"),
    ("left", "ArrowLeft"),
    ("right", "ArrowRight"),
    ("ctrl+a", "Control+a"),
    ("cmd+a", "Meta+a"),
    ("ctrl+c", "Control+c"),
    ("cmd+c", "Meta+c"),
    ("ctrl+v", "Control+v"),
    ("cmd+v", "Meta+v"),
    ("ctrl+x", "Control+x"),
    ("cmd+x", "Meta+x"),
    ("ctrl+z", "Control+z"),
    ("cmd+z", "Meta+z"),
    ("ctrl+y", "Control+y"),
    ("cmd+y", "Meta+y"),
    ("ctrl+f", "Control+f"),
    ("cmd+f", "Meta+f"),
    ("f1", "F1"),
    ("f2", "F2"),
    ("f3", "F3"),
    ("f4", "F4"),
    ("f5", "F5"),
    ("f6", "F6"),
    ("f7", "F7"),
    ("f8", "F8"),
    ("f9", "F9"),
    ("f10", "F10"),
    ("f11", "F11"),
    ("f12", "F12"),
    ("home", "Home"),
    ("end", "End"),
    ("pageup", "PageUp"),
    ("pagedown", "PageDown"),
    ("alt+tab", "Alt+Tab"),
    ("ctrl+enter", "Control+Enter"),
    ("cmd+enter", "Meta+Enter"),
    ("ctrl+home", "Control+Home"),
    ("cmd+home", "Meta+Home"),
    ("ctrl+end", "Control+End"),
    ("cmd+end", "Meta+End"),
    ("ctrl+t", "Control+t"),
    ("cmd+t", "Meta+t"),
    ("ctrl+w", "Control+w"),
    ("cmd+w", "Meta+w"),
    ("ctrl+r", "Control+r"),
    ("cmd+r", "Meta+r"),
];

fn special_key(name: &str) -> Option<&'static str> {
    SPECIAL_KEYS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, key)| *key)
}

/// Named key, else the name with its first letter upper-cased (`shift` → `Shift`).
fn key_or_capitalized(name: &str) -> String {
    if let Some(key) = special_key(name) {
        return key.to_string();
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One step of a keyboard request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Press a named key. `name` is what the agent wrote.
    Press { name: String, key: String },
    /// Hold `modifier` while pressing `key`.
    Hold { modifier: String, key: String },
    /// Type literal text.
    Type(String),
}

impl KeyAction {
    /// Key or combination for [`PageHost::press_key`](crate::PageHost::press_key);
    /// `None` for text.
    pub fn combo(&self) -> Option<String> {
        match self {
            KeyAction::Press { key, .. } => Some(key.clone()),
            KeyAction::Hold { modifier, key } => Some(format!(
                "{}+{}",
                key_or_capitalized(modifier),
                key_or_capitalized(key)
            )),
            KeyAction::Type(_) => None,
        }
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Press { name, .. } => write!(f, "Pressed {}", name),
            KeyAction::Hold { modifier, key } => write!(f, "Held {} and pressed {}", modifier, key),
            KeyAction::Type(text) => write!(f, "Typed '{}'", text),
        }
    }
}

/// `hold <modifier>[,] [press] <key>`
fn hold_pattern() -> Option<&'static Regex> {
    static HOLD: OnceLock<Option<Regex>> = OnceLock::new();
    HOLD.get_or_init(|| Regex::new(r"(?i)^hold\s+(\w+),?\s+(?:press\s+)?(\w+)\s*$").ok())
        .as_ref()
}

/// A single named key or hold request, if `part` is one.
fn parse_key(part: &str) -> Option<KeyAction> {
    let name = part.trim().to_lowercase();
    if let Some(key) = special_key(&name) {
        return Some(KeyAction::Press {
            name,
            key: key.to_string(),
        });
    }
    let caps = hold_pattern()?.captures(&name)?;
    Some(KeyAction::Hold {
        modifier: caps[1].to_string(),
        key: caps[2].to_string(),
    })
}

/// Split a keyboard request into steps. Surrounding quotes are dropped.
///
/// A `,`/`;` separated list becomes a key sequence only when every part is a
/// named key or hold request; anything else is typed verbatim, punctuation
/// and case included.
pub fn parse_keys(input: &str) -> Vec<KeyAction> {
    let input = input
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .trim();
    if input.is_empty() {
        return Vec::new();
    }
    if let Some(action) = parse_key(input) {
        return vec![action];
    }
    if input.contains([',', ';']) {
        let parts: Vec<&str> = input
            .split([',', ';'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let keys: Option<Vec<KeyAction>> = parts.iter().map(|p| parse_key(p)).collect();
        if let Some(keys) = keys.filter(|k| !k.is_empty()) {
            return keys;
        }
    }
    vec![KeyAction::Type(input.to_string())]
}
