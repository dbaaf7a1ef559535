//! Relay routing rules
//!
//! The relay never interprets payloads. It parses just enough to read the
//! `type` tag, checks it against the sender's role, and forwards the original
//! text untouched.

use andro_core::{PeerRole, RelayMessage};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("invalid-json")]
    InvalidJson,
    #[error("invalid-payload")]
    InvalidPayload,
    #[error("unsupported-message")]
    UnsupportedMessage,
}

impl RelayError {
    /// Wire code carried in the error ack.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidJson => "invalid-json",
            RelayError::InvalidPayload => "invalid-payload",
            RelayError::UnsupportedMessage => "unsupported-message",
        }
    }

    pub fn ack(&self) -> RelayMessage {
        RelayMessage::ack_error(self.code())
    }
}

/// Where one inbound message goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Send `text` to every peer of role `to` in the sender's room
    Forward { to: PeerRole, text: String },
    /// Reply to the sender with an error ack
    Reject(RelayError),
}

/// Decide the fate of `raw` sent by a peer of role `from`.
pub fn route(from: PeerRole, raw: &str) -> Route {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return Route::Reject(RelayError::InvalidJson),
    };
    let Some(object) = value.as_object() else {
        return Route::Reject(RelayError::InvalidPayload);
    };

    let kind = object.get("type").and_then(Value::as_str);
    match (kind, from) {
        (Some("state"), PeerRole::Creature)
        | (Some("request_state"), PeerRole::Dashboard)
        | (Some("command"), PeerRole::Dashboard) => Route::Forward {
            to: from.counterpart(),
            text: raw.to_string(),
        },
        _ => Route::Reject(RelayError::UnsupportedMessage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_goes_to_dashboards() {
        let raw = r#"{"type":"state","emotion":"happy"}"#;
        assert_eq!(
            route(PeerRole::Creature, raw),
            Route::Forward {
                to: PeerRole::Dashboard,
                text: raw.to_string()
            }
        );
    }

    #[test]
    fn test_dashboard_messages_go_to_creature() {
        for raw in [
            r#"{"type":"request_state"}"#,
            r#"{"type":"command","action":"feed"}"#,
        ] {
            assert!(matches!(
                route(PeerRole::Dashboard, raw),
                Route::Forward {
                    to: PeerRole::Creature,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_role_checked() {
        assert_eq!(
            route(PeerRole::Dashboard, r#"{"type":"state"}"#),
            Route::Reject(RelayError::UnsupportedMessage)
        );
        assert_eq!(
            route(PeerRole::Creature, r#"{"type":"command","action":"wake"}"#),
            Route::Reject(RelayError::UnsupportedMessage)
        );
        assert_eq!(
            route(PeerRole::Creature, r#"{"kind":"state"}"#),
            Route::Reject(RelayError::UnsupportedMessage)
        );
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(
            route(PeerRole::Dashboard, "{nope"),
            Route::Reject(RelayError::InvalidJson)
        );
        assert_eq!(
            route(PeerRole::Dashboard, "[1, 2]"),
            Route::Reject(RelayError::InvalidPayload)
        );
        assert_eq!(
            route(PeerRole::Dashboard, "null"),
            Route::Reject(RelayError::InvalidPayload)
        );
        assert_eq!(
            route(PeerRole::Dashboard, "\"state\""),
            Route::Reject(RelayError::InvalidPayload)
        );
    }

    #[test]
    fn test_error_ack_shape() {
        let ack = serde_json::to_value(RelayError::InvalidJson.ack()).unwrap();
        assert_eq!(
            ack,
            serde_json::json!({"type": "ack", "ok": false, "error": "invalid-json"})
        );
    }
}
