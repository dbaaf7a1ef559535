use crate::state::Mode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AndroConfig {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub relay: RelayConfig,
    pub weather: WeatherConfig,
    pub notifications: NotificationConfig,
}

impl AndroConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: AndroConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ANDRO_MODE") {
            match Mode::parse(&v) {
                Some(mode) => self.engine.initial_mode = Some(mode),
                None => tracing::warn!("Ignoring unknown ANDRO_MODE '{}'", v),
            }
        }
        if let Ok(v) = std::env::var("ANDRO_STATE_PATH") {
            self.storage.path = v;
        }
        if let Ok(v) = std::env::var("ANDRO_RELAY_TOKEN") {
            self.relay.token = Some(v);
        }
        if let Ok(v) = std::env::var("ANDRO_RELAY_PORT") {
            if let Ok(n) = v.parse() {
                self.relay.port = n;
            }
        }
        if let Ok(v) = std::env::var("ANDRO_WEATHER_URL") {
            self.weather.base_url = v;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Render/update loop period
    pub frame_interval_ms: u64,
    /// Drive decay + sensor fusion + emotion resolution period
    pub cognition_interval_ms: u64,
    /// Routine evaluation period
    pub routine_interval_secs: u64,
    /// Idle interaction (or stillness) after which the creature falls asleep
    pub inactivity_sleep_secs: u64,
    /// Seed for blink/retarget jitter. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Local wall-clock offset used for daily routines. `None` uses the host's.
    pub utc_offset_minutes: Option<i32>,
    /// Forces the mode at startup, overriding the stored one
    pub initial_mode: Option<Mode>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            cognition_interval_ms: 2_000,
            routine_interval_secs: 60,
            inactivity_sleep_secs: 20 * 60,
            seed: None,
            utc_offset_minutes: None,
            initial_mode: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            path: "andro-state.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret required from every peer. Without one the relay refuses all peers.
    pub token: Option<String>,
    /// Relay URL the creature connects to, e.g. `ws://relay.local:8787/ws`
    pub url: Option<String>,
    pub creature_id: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            token: None,
            url: None,
            creature_id: "emo-01".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            latitude: None,
            longitude: None,
            timeout_secs: 7,
        }
    }
}

impl WeatherConfig {
    /// Coordinates, if a position fix is configured.
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Whether the host grants notification permission
    pub enabled: bool,
}

// ============================================================================
// Tests
// ============================================================================
