//! Target parsing - turns a caller's target string into a normalized query.
//!
//! Accepted shapes, tried in order:
//! - `{"id": 3, "type": "button", "text": "Submit"}` - JSON object
//! - `{type: button, text: Submit}` - loose `key: value` pairs in braces
//! - `[3][button]Submit` - a line echoed straight from the page report
//! - anything else is free text, matched holistically

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::classify::InteractionType;

/// Normalized target query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetSpec {
    /// Element id as supplied; converted at resolution time.
    pub id: Option<String>,
    /// Lower-cased type name. Kept as a string so unknown names still take
    /// part in (relaxed) matching.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Lower-cased target text.
    pub text: Option<String>,
    /// Whether the caller tagged the fields explicitly.
    pub structured: bool,
}

impl TargetSpec {
    /// Parse a raw target string. Never fails: unrecognised input becomes a
    /// free-text query.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            let parsed = match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(map)) => Some(Self::from_json(&map)),
                Ok(_) => None,
                Err(_) => Some(Self::from_pairs(trimmed)),
            };
            if let Some(spec) = parsed.filter(|s| s.has_criteria()) {
                return spec;
            }
        }

        if let Some(spec) = Self::from_marker(trimmed) {
            return spec;
        }

        Self {
            text: non_empty(trimmed).map(str::to_lowercase),
            ..Self::default()
        }
    }

    fn from_json(map: &serde_json::Map<String, Value>) -> Self {
        let field = |key: &str| match map.get(key) {
            Some(Value::String(s)) => non_empty(s.trim()).map(String::from),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        };
        Self {
            id: field("id"),
            kind: field("type").map(|s| s.to_lowercase()),
            text: field("text").map(|s| s.to_lowercase()),
            structured: true,
        }
    }

    fn from_pairs(braced: &str) -> Self {
        let inner = braced.trim_start_matches('{').trim_end_matches('}');
        let mut spec = Self {
            structured: true,
            ..Self::default()
        };
        for part in inner.split(',') {
            let Some((key, value)) = part.split_once(':') else {
                continue;
            };
            let value = unquote(value.trim());
            let value = non_empty(value).map(String::from);
            match key.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase().as_str() {
                "id" => spec.id = value,
                "type" => spec.kind = value.map(|v| v.to_lowercase()),
                "text" => spec.text = value.map(|v| v.to_lowercase()),
                _ => {}
            }
        }
        spec
    }

    fn from_marker(s: &str) -> Option<Self> {
        static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
        let re = MARKER
            .get_or_init(|| Regex::new(r"^\[(\d+)\]\[(.*?)\](.*)").ok())
            .as_ref()?;
        let caps = re.captures(s)?;
        let group = |i: usize| {
            caps.get(i)
                .and_then(|m| non_empty(m.as_str().trim()))
                .map(str::to_lowercase)
        };
        Some(Self {
            id: group(1),
            kind: group(2),
            text: group(3),
            structured: true,
        })
    }

    /// At least one of id, type, text is present.
    pub fn has_criteria(&self) -> bool {
        self.id.is_some() || self.kind.is_some() || self.text.is_some()
    }

    /// The id as an index into a snapshot of `len` elements. Non-numeric or
    /// out-of-range ids yield `None`.
    pub fn index(&self, len: usize) -> Option<usize> {
        self.id
            .as_deref()
            .and_then(|id| id.trim().parse::<usize>().ok())
            .filter(|&i| i < len)
    }

    /// The id parsed as a number, regardless of range.
    pub fn numeric_id(&self) -> Option<usize> {
        self.id.as_deref().and_then(|id| id.trim().parse().ok())
    }

    /// The type as a known [`InteractionType`], if it names one.
    pub fn kind(&self) -> Option<InteractionType> {
        self.kind.as_deref().and_then(|k| k.parse().ok())
    }

    /// `id=.., type=.., text=..` listing of the supplied criteria.
    pub fn criteria(&self) -> String {
        let mut parts = Vec::new();
        if let Some(id) = &self.id {
            parts.push(format!("id={}", id));
        }
        if let Some(kind) = &self.kind {
            parts.push(format!("type={}", kind));
        }
        if let Some(text) = &self.text {
            parts.push(format!("text={}", text));
        }
        parts.join(", ")
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.structured {
            write!(f, "{}", self.criteria())
        } else {
            write!(f, "'{}'", self.text.as_deref().unwrap_or_default())
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let spec = TargetSpec::parse(r#"{"id": 5, "type": "Button", "text": "Submit Order"}"#);
        assert_eq!(spec.id.as_deref(), Some("5"));
        assert_eq!(spec.kind.as_deref(), Some("button"));
        assert_eq!(spec.text.as_deref(), Some("submit order"));
        assert!(spec.structured);
        assert_eq!(spec.kind(), Some(InteractionType::Button));
    }

    #[test]
    fn test_parse_json_id_zero() {
        let spec = TargetSpec::parse(r#"{"id": 0}"#);
        assert_eq!(spec.index(3), Some(0));
        assert!(spec.structured);
    }

    #[test]
    fn test_parse_loose_pairs() {
        let spec = TargetSpec::parse("{Type: link, TEXT: Pricing Plans}");
        assert_eq!(spec.id, None);
        assert_eq!(spec.kind.as_deref(), Some("link"));
        assert_eq!(spec.text.as_deref(), Some("pricing plans"));
        assert!(spec.structured);
    }

    #[test]
    fn test_parse_marker() {
        let spec = TargetSpec::parse("[12][checkbox]Remember Me");
        assert_eq!(spec.id.as_deref(), Some("12"));
        assert_eq!(spec.kind.as_deref(), Some("checkbox"));
        assert_eq!(spec.text.as_deref(), Some("remember me"));
        assert!(spec.structured);
    }

    #[test]
    fn test_parse_free_text() {
        let spec = TargetSpec::parse("  Sign In button ");
        assert_eq!(spec.text.as_deref(), Some("sign in button"));
        assert!(!spec.structured);
        assert!(spec.id.is_none() && spec.kind.is_none());
    }

    #[test]
    fn test_empty_object_is_free_text() {
        let spec = TargetSpec::parse(r#"{"foo": "bar"}"#);
        assert!(!spec.structured);
        assert_eq!(spec.text.as_deref(), Some(r#"{"foo": "bar"}"#));
    }

    #[test]
    fn test_index_bounds() {
        let spec = TargetSpec::parse(r#"{"id": "7"}"#);
        assert_eq!(spec.index(8), Some(7));
        assert_eq!(spec.index(7), None);
        assert_eq!(TargetSpec::parse(r#"{"id": "seven"}"#).index(100), None);
    }

    #[test]
    fn test_unknown_type_kept() {
        let spec = TargetSpec::parse(r#"{"type": "toggle", "text": "dark mode"}"#);
        assert_eq!(spec.kind.as_deref(), Some("toggle"));
        assert_eq!(spec.kind(), None);
    }

    #[test]
    fn test_criteria_listing() {
        let spec = TargetSpec::parse(r#"{"id": 3, "type": "button"}"#);
        assert_eq!(spec.criteria(), "id=3, type=button");
        assert_eq!(spec.to_string(), "id=3, type=button");
        assert_eq!(TargetSpec::parse("go home").to_string(), "'go home'");
    }
}
