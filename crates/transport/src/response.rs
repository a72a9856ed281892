//! Content negotiation for response bodies.
//!
//! The decision tree is:
//!
//! 1. JSON-typed body → parse; on failure re-read as text and parse again;
//!    on failure → `MalformedResponse("invalid response format")`.
//! 2. Any other type → read as text and try JSON anyway (servers mislabel);
//!    on failure → `MalformedResponse("non-JSON response: <excerpt>")`.
//!
//! Nothing outside this module coerces bodies.

use memochat_types::{Result, TransportError};
use serde_json::Value;

/// How many characters of a non-JSON body are kept for diagnosis.
pub const EXCERPT_CHARS: usize = 100;

const BOM: char = '\u{feff}';

/// Returns `true` for `application/json` and `+json` media types.
#[must_use]
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let essence = ct
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Decodes a response body according to its declared content type.
///
/// An empty body decodes to `null`.
///
/// # Errors
///
/// Returns [`TransportError::MalformedResponse`] if no fallback path yields JSON.
pub fn decode_body(content_type: Option<&str>, body: &[u8]) -> Result<Value> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    if is_json_content_type(content_type) {
        if let Ok(value) = serde_json::from_slice(body) {
            return Ok(value);
        }
        let text = String::from_utf8_lossy(body);
        return parse_text(&text)
            .ok_or_else(|| TransportError::MalformedResponse("invalid response format".into()));
    }
    let text = String::from_utf8_lossy(body);
    parse_text(&text).ok_or_else(|| {
        TransportError::MalformedResponse(format!("non-JSON response: {}", excerpt(&text)))
    })
}

fn parse_text(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim_start_matches(BOM).trim()).ok()
}

/// The first [`EXCERPT_CHARS`] characters of `text`.
#[must_use]
pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

/// Strips an outer `{"data": ...}` envelope.
///
/// Any object with a `data` key is unwrapped, even one that was not meant as
/// an envelope; a body of `{"data": null}` yields `null`.
#[must_use]
pub fn unwrap_envelope(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Human-readable message for a failed response.
///
/// Prefers the payload's `message` field, then `error` (a string, or an
/// object carrying its own `message`), then a generic status message.
#[must_use]
pub fn error_message(payload: Option<&Value>, status: u16) -> String {
    payload
        .and_then(|p| {
            p.get("message")
                .and_then(Value::as_str)
                .or_else(|| match p.get("error") {
                    Some(Value::String(s)) => Some(s.as_str()),
                    Some(obj @ Value::Object(_)) => obj.get("message").and_then(Value::as_str),
                    _ => None,
                })
        })
        .filter(|m| !m.is_empty())
        .map_or_else(|| format!("request failed ({status})"), str::to_string)
}
