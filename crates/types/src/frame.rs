//! Typed frames carried by `data:` lines of a streamed chat reply.

use serde::Deserialize;

/// Fallback text for an error frame that carries no message.
const DEFAULT_STREAM_ERROR: &str = "stream failed";

/// One classified `data:` payload.
///
/// The server tags every payload with a `type` field; unknown tags map to
/// [`Frame::Unknown`] and are ignored by readers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// An incremental piece of the assistant reply.
    Token {
        #[serde(default)]
        content: String,
    },
    /// The reply finished and was saved under `message_id`.
    Done {
        #[serde(default)]
        message_id: Option<i64>,
    },
    /// The server aborted generation.
    Error {
        #[serde(default = "default_error_message")]
        message: String,
        #[serde(default)]
        error_code: Option<String>,
    },
    /// Echo of the user's message as it was persisted.
    UserMessage {
        #[serde(default)]
        message_id: Option<i64>,
        #[serde(default)]
        content: String,
    },
    #[serde(other)]
    Unknown,
}

fn default_error_message() -> String {
    DEFAULT_STREAM_ERROR.to_string()
}

impl Frame {
    /// Parses the JSON text following a `data: ` prefix.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when the payload is not a
    /// JSON object with a string `type` field.
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token() {
        let f = Frame::parse(r#"{"type":"token","content":"Hel"}"#).unwrap();
        assert_eq!(
            f,
            Frame::Token {
                content: "Hel".into()
            }
        );
    }

    #[test]
    fn test_parse_done() {
        let f = Frame::parse(r#"{"type":"done","message_id":42}"#).unwrap();
        assert_eq!(
            f,
            Frame::Done {
                message_id: Some(42)
            }
        );
    }

    #[test]
    fn test_parse_error_with_code() {
        let f = Frame::parse(
            r#"{"type":"error","message":"agent failed","error_code":"INTERNAL_ERROR"}"#,
        )
        .unwrap();
        assert_eq!(
            f,
            Frame::Error {
                message: "agent failed".into(),
                error_code: Some("INTERNAL_ERROR".into()),
            }
        );
    }

    #[test]
    fn test_parse_error_without_message() {
        let f = Frame::parse(r#"{"type":"error"}"#).unwrap();
        assert!(matches!(f, Frame::Error { message, .. } if message == "stream failed"));
    }

    #[test]
    fn test_parse_user_message() {
        let f = Frame::parse(r#"{"type":"user_message","message_id":7,"content":"hi"}"#).unwrap();
        assert_eq!(
            f,
            Frame::UserMessage {
                message_id: Some(7),
                content: "hi".into()
            }
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        let f = Frame::parse(r#"{"type":"heartbeat","at":1}"#).unwrap();
        assert_eq!(f, Frame::Unknown);
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(Frame::parse("{not json").is_err());
        assert!(Frame::parse(r#"{"content":"no type"}"#).is_err());
    }
}
