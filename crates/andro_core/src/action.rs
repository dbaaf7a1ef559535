//! Discrete actions arriving from outside the engine
//!
//! Three channels feed actions in: the cross-instance notification channel
//! (`{id, action, payload}` packets written by the controls surface), the
//! remote relay (`command` messages from a dashboard) and notification launch
//! actions. They all converge on [`Action`].

use crate::state::Mode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Where a free-text command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    Voice,
    Typed,
    Controls,
    Remote,
}

impl CommandSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandSource::Voice => "voice",
            CommandSource::Typed => "typed",
            CommandSource::Controls => "controls",
            CommandSource::Remote => "remote",
        }
    }
}

impl std::fmt::Display for CommandSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-shot message on the cross-instance channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPacket {
    pub id: i64,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("unsupported action '{0}'")]
    Unsupported(String),
    #[error("invalid payload for '{action}': {reason}")]
    InvalidPayload { action: String, reason: String },
}

/// A decoded engine action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Wake,
    Sleep,
    SetMode(Mode),
    Feed,
    VoiceToggle { enabled: bool },
    Mute,
    Command { text: String },
    /// Pin the look target to `x` pixels for a short while
    EyePosition { x: f32 },
}

impl Action {
    /// Decode an action name and its payload.
    pub fn decode(action: &str, payload: &Value) -> Result<Self, ActionError> {
        let invalid = |reason: &str| ActionError::InvalidPayload {
            action: action.to_string(),
            reason: reason.to_string(),
        };

        match action {
            "wake" => Ok(Action::Wake),
            "sleep" => Ok(Action::Sleep),
            "feed" => Ok(Action::Feed),
            "mute" => Ok(Action::Mute),
            "mode" => match payload.get("mode").and_then(Value::as_str) {
                None => Ok(Action::SetMode(Mode::Chill)),
                Some(name) => Mode::parse(name)
                    .map(Action::SetMode)
                    .ok_or_else(|| invalid("unknown mode")),
            },
            "voice-toggle" => Ok(Action::VoiceToggle {
                enabled: payload
                    .get("enabled")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }),
            "command" => {
                let text = payload
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(Action::Command {
                    text: text.to_string(),
                })
            }
            "eyePosition" | "eye-position" => payload
                .get("x")
                .and_then(Value::as_f64)
                .map(|x| Action::EyePosition { x: x as f32 })
                .ok_or_else(|| invalid("missing numeric x")),
            other => Err(ActionError::Unsupported(other.to_string())),
        }
    }

    pub fn from_packet(packet: &ActionPacket) -> Result<Self, ActionError> {
        Self::decode(&packet.action, &packet.payload)
    }

    /// Map a notification launch action (`?action=...`).
    pub fn from_launch(action: &str) -> Option<Self> {
        match action {
            "wake" => Some(Action::Wake),
            "sleep" => Some(Action::Sleep),
            "focus" => Some(Action::SetMode(Mode::Focus)),
            "mute" | "mute-mic" => Some(Action::Mute),
            _ => None,
        }
    }
}
