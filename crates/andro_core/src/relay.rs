//! Relay wire protocol
//!
//! JSON messages tagged by `type`. The relay itself only looks at the tag and
//! the sender's role; payloads are forwarded verbatim.

use crate::durable::Mood;
use crate::state::{Emotion, Mode, SystemMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side of a relay room a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    Creature,
    Dashboard,
}

impl PeerRole {
    /// Parse a role from a path segment. `pet` is the legacy name of `creature`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creature" | "pet" => Some(PeerRole::Creature),
            "dashboard" => Some(PeerRole::Dashboard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeerRole::Creature => "creature",
            PeerRole::Dashboard => "dashboard",
        }
    }

    /// The role that receives what this role sends.
    pub fn counterpart(&self) -> Self {
        match self {
            PeerRole::Creature => PeerRole::Dashboard,
            PeerRole::Dashboard => PeerRole::Creature,
        }
    }
}

/// Snapshot the creature publishes to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureStatus {
    pub emotion: Emotion,
    pub mode: Mode,
    pub mood: Mood,
    pub system_mode: SystemMode,
    pub sleeping: bool,
    pub energy: f32,
    pub curiosity: f32,
    pub social_need: f32,
    pub care_points: u32,
    #[serde(default)]
    pub battery_level: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    State(CreatureStatus),
    RequestState,
    Command {
        action: String,
        #[serde(default)]
        payload: Value,
    },
    Ack {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<PeerRole>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl RelayMessage {
    pub fn ack_ok(role: PeerRole) -> Self {
        RelayMessage::Ack {
            ok: true,
            role: Some(role),
            error: None,
        }
    }

    pub fn ack_error(error: &str) -> Self {
        RelayMessage::Ack {
            ok: false,
            role: None,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(PeerRole::parse("pet"), Some(PeerRole::Creature));
        assert_eq!(PeerRole::parse("dashboard"), Some(PeerRole::Dashboard));
        assert_eq!(PeerRole::parse("admin"), None);
        assert_eq!(PeerRole::Dashboard.counterpart(), PeerRole::Creature);
    }

    #[test]
    fn test_ack_wire_format() {
        let json = serde_json::to_value(RelayMessage::ack_error("invalid-json")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "ack", "ok": false, "error": "invalid-json"})
        );
        let json = serde_json::to_value(RelayMessage::ack_ok(PeerRole::Creature)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "ack", "ok": true, "role": "creature"})
        );
    }

    #[test]
    fn test_parse_dashboard_command() {
        let msg: RelayMessage = serde_json::from_str(
            r#"{"type":"command","action":"mode","payload":{"mode":"focus"}}"#,
        )
        .unwrap();
        match msg {
            RelayMessage::Command { action, payload } => {
                assert_eq!(action, "mode");
                assert_eq!(payload["mode"], "focus");
            }
            other => panic!("unexpected {:?}", other),
        }
        let msg: RelayMessage = serde_json::from_str(r#"{"type":"request_state"}"#).unwrap();
        assert_eq!(msg, RelayMessage::RequestState);
    }
}
