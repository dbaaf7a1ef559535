//! Durable state shared across sessions
//!
//! Persisted by whatever store the runtime wires in. Loading is forgiving:
//! unknown keys are ignored, missing keys take their defaults, and a key whose
//! value has the wrong shape falls back to the default for that key only.

use crate::state::{Millis, Mode};
use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum entries kept in the memory and notes logs.
pub const LOG_CAPACITY: usize = 40;

/// Deserialize a field, substituting `T::default()` when the stored value is malformed.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_else(|e| {
        tracing::warn!("Malformed durable field ({}), using default", e);
        T::default()
    }))
}

fn lenient_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_bool().unwrap_or(true))
}

fn lenient_log<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut log: Vec<String> = lenient(deserializer)?;
    trim_log(&mut log);
    Ok(log)
}

fn default_true() -> bool {
    true
}

fn trim_log(log: &mut Vec<String>) {
    if log.len() > LOG_CAPACITY {
        let excess = log.len() - LOG_CAPACITY;
        log.drain(..excess);
    }
}

/// Informational mood label shown by the controls surface and dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mood {
    #[default]
    Calm,
    Happy,
    Engaged,
    Cozy,
    Focus,
    Night,
    LowPower,
}

/// Last-fired records guaranteeing at-most-once routine firing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoutineLedger {
    /// Day key (`YYYY-MM-DD`) of the last morning greeting
    #[serde(deserialize_with = "lenient")]
    pub last_morning_day: String,
    /// Day key of the last bedtime switch
    #[serde(deserialize_with = "lenient")]
    pub last_bedtime_day: String,
    #[serde(deserialize_with = "lenient")]
    pub last_hydration_at: Millis,
    #[serde(deserialize_with = "lenient")]
    pub last_break_at: Millis,
    #[serde(deserialize_with = "lenient")]
    pub last_weather_at: Millis,
}

/// The durable record. Full-object overwrite on save (last writer wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DurableState {
    #[serde(deserialize_with = "lenient")]
    pub mode: Mode,
    #[serde(deserialize_with = "lenient")]
    pub mood: Mood,
    #[serde(deserialize_with = "lenient")]
    pub care_points: u32,
    #[serde(default = "default_true", deserialize_with = "lenient_true")]
    pub voice_enabled: bool,
    #[serde(deserialize_with = "lenient")]
    pub notifications_enabled: bool,
    #[serde(deserialize_with = "lenient")]
    pub weather_enabled: bool,
    /// Last known battery level, for the controls surface
    #[serde(deserialize_with = "lenient")]
    pub battery_level: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub last_weather_code: Option<u16>,
    #[serde(deserialize_with = "lenient_log")]
    pub memory: Vec<String>,
    #[serde(deserialize_with = "lenient_log")]
    pub notes: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub routine: RoutineLedger,
}

impl Default for DurableState {
    fn default() -> Self {
        Self {
            mode: Mode::Chill,
            mood: Mood::Calm,
            care_points: 0,
            voice_enabled: true,
            notifications_enabled: false,
            weather_enabled: false,
            battery_level: None,
            last_weather_code: None,
            memory: Vec::new(),
            notes: Vec::new(),
            routine: RoutineLedger::default(),
        }
    }
}

impl DurableState {
    /// Parse a stored document. Anything unreadable at the top level yields defaults.
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Stored state unreadable ({}), starting from defaults", e);
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Append a timestamped entry to the memory log, dropping the oldest past capacity.
    pub fn remember(&mut self, at: DateTime<FixedOffset>, message: &str) {
        self.memory
            .push(format!("{} - {}", at.format("%Y-%m-%d %H:%M:%S"), message));
        trim_log(&mut self.memory);
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
        trim_log(&mut self.notes);
    }

    pub fn last_memory(&self) -> Option<&str> {
        self.memory.last().map(String::as_str)
    }
}
