//! Flattening of tool arguments into reviewable label/value pairs.
//!
//! Nested objects become prefixed labels (`{"destination": {"city": ..}}`
//! reads as "Destination City"), arrays collapse into a single comma-joined
//! value, and `null` or empty-string fields are left out. Every `Value` has a
//! string form, so formatting cannot fail.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// A single argument line shown on the confirmation surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayParam {
    pub label: String,
    pub value: String,
}

impl DisplayParam {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Flatten an argument object depth-first, in key order.
pub fn format_arguments(arguments: &Map<String, Value>) -> Vec<DisplayParam> {
    let mut params = Vec::new();
    flatten_into(arguments, "", &mut params);
    params
}

fn flatten_into(obj: &Map<String, Value>, prefix: &str, out: &mut Vec<DisplayParam>) {
    for (key, value) in obj {
        if is_blank(value) {
            continue;
        }

        let label = format!("{prefix} {}", key.replace('_', " "))
            .trim()
            .to_owned();

        match value {
            Value::Object(child) => flatten_into(child, &label, out),
            other => out.push(DisplayParam {
                label: capitalize_words(&label),
                value: format_value(other),
            }),
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Render any JSON value as a single display string.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(obj) => obj
            .iter()
            .filter(|(_, v)| !is_blank(v))
            .map(|(k, v)| format!("{k}: {}", format_value(v)))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Backend text made safe for a terminal: control characters and bidi
/// overrides are replaced by visible escapes, so a value always stays on its
/// own line and cannot move the cursor.
pub fn escape_control(text: &str) -> Cow<'_, str> {
    escape_with(text, false)
}

/// Like [`escape_control`], but line breaks survive. For free-form replies.
pub fn escape_control_multiline(text: &str) -> Cow<'_, str> {
    escape_with(text, true)
}

fn escape_with(text: &str, keep_newlines: bool) -> Cow<'_, str> {
    let needs_escape =
        |c: char| (c.is_control() && !(keep_newlines && c == '\n')) || is_bidi_override(c);
    if !text.chars().any(needs_escape) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if !needs_escape(c) {
            out.push(c);
        } else if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.extend(c.escape_unicode());
        }
    }
    Cow::Owned(out)
}

fn is_bidi_override(c: char) -> bool {
    matches!(c, '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}')
}

/// `"book_flight"` -> `"Book Flight"`.
pub fn humanize_tool_name(name: &str) -> String {
    capitalize_words(&name.replace('_', " "))
}

fn capitalize_words(label: &str) -> String {
    label
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => {
            let mut result = c.to_uppercase().to_string();
            result.push_str(chars.as_str());
            result
        }
        None => String::new(),
    }
}
