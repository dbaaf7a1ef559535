//! # Andro perception
//!
//! Acquisition collaborators that feed the engine from outside: the weather
//! lookup behind the weather routine, and replay of recorded sensor traces
//! standing in for live hardware.

pub mod trace;
pub mod weather;

pub use trace::{spawn_replay, SensorTrace, TraceEntry};
pub use weather::{OpenMeteoProvider, WeatherError, WeatherProvider};
