//! Tagged success/failure decoding of JSON response payloads.
//!
//! The server signals failure either with a non-2xx status or with an explicit
//! `"ok": false` in the body. Anything else counts as success, including a
//! body that is not an object at all.

use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The request never produced a response.
    Transport(String),
    /// Non-2xx status.
    Status { status: u16, payload: Value },
    /// 2xx status with `"ok": false` in the payload.
    Application {
        message: Option<String>,
        payload: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(FailureReason),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The payload a caller would branch on. Transport failures yield a
    /// synthetic `{"ok": false, "error": ...}` object.
    pub fn payload(&self) -> Value {
        match self {
            Self::Success(payload) => payload.clone(),
            Self::Failure(FailureReason::Status { payload, .. })
            | Self::Failure(FailureReason::Application { payload, .. }) => payload.clone(),
            Self::Failure(FailureReason::Transport(error)) => json!({ "ok": false, "error": error }),
        }
    }

    pub fn into_payload(self) -> Value {
        match self {
            Self::Success(payload) => payload,
            Self::Failure(FailureReason::Status { payload, .. })
            | Self::Failure(FailureReason::Application { payload, .. }) => payload,
            Self::Failure(FailureReason::Transport(error)) => json!({ "ok": false, "error": error }),
        }
    }

    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Success(_) => None,
            Self::Failure(FailureReason::Transport(error)) => Some(error.clone()),
            Self::Failure(FailureReason::Status { status, payload }) => {
                Some(payload_message(payload).unwrap_or_else(|| format!("status {status}")))
            }
            Self::Failure(FailureReason::Application { message, .. }) => message.clone(),
        }
    }
}

/// Parse a raw body, falling back to `{"ok": <2xx>}` when it is not JSON.
pub fn parse_body(status: u16, body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| json!({ "ok": is_success_status(status) }))
}

pub fn decode_payload(status: u16, payload: Value) -> Outcome {
    if !is_success_status(status) {
        return Outcome::Failure(FailureReason::Status { status, payload });
    }
    if explicit_failure(&payload) {
        return Outcome::Failure(FailureReason::Application {
            message: payload_message(&payload),
            payload,
        });
    }
    Outcome::Success(payload)
}

pub(crate) fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

fn explicit_failure(payload: &Value) -> bool {
    payload.get("ok").and_then(Value::as_bool) == Some(false)
}

fn payload_message(payload: &Value) -> Option<String> {
    ["message", "error", "answer"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn success_unless_ok_is_explicitly_false() {
        assert!(decode_payload(200, json!({ "ok": true })).is_success());
        assert!(decode_payload(200, json!({ "items": [] })).is_success());
        assert!(decode_payload(200, Value::Null).is_success());
        assert!(decode_payload(200, json!([1, 2, 3])).is_success());
        // Only a boolean false counts.
        assert!(decode_payload(200, json!({ "ok": "false" })).is_success());
        assert!(decode_payload(200, json!({ "ok": 0 })).is_success());
    }

    #[test]
    fn application_failure_keeps_payload_and_message() {
        let payload = json!({ "ok": false, "message": "Notice not found" });
        let outcome = decode_payload(200, payload.clone());

        assert_eq!(
            outcome,
            Outcome::Failure(FailureReason::Application {
                message: Some("Notice not found".to_string()),
                payload: payload.clone(),
            })
        );
        assert_eq!(outcome.payload(), payload);
    }

    #[test]
    fn non_success_status_is_failure_even_with_ok_true() {
        let outcome = decode_payload(500, json!({ "ok": true }));
        assert!(!outcome.is_success());
        assert_eq!(outcome.failure_message(), Some("status 500".to_string()));

        let outcome = decode_payload(400, json!({ "ok": false, "answer": "Please provide a question." }));
        assert_eq!(
            outcome.failure_message(),
            Some("Please provide a question.".to_string())
        );
    }

    #[test]
    fn transport_failure_payload_is_ok_false_shaped() {
        let outcome = Outcome::Failure(FailureReason::Transport("connection refused".into()));
        assert_eq!(
            outcome.into_payload(),
            json!({ "ok": false, "error": "connection refused" })
        );
    }

    #[test]
    fn unparseable_body_falls_back_to_status_flag() {
        assert_eq!(parse_body(200, "<html>"), json!({ "ok": true }));
        assert_eq!(parse_body(502, "Bad Gateway"), json!({ "ok": false }));
        assert_eq!(parse_body(200, "{\"ok\":false}"), json!({ "ok": false }));
    }
}
