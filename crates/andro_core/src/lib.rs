//! # Andro core
//!
//! Shared vocabulary for the creature: session state (drives, environment,
//! transient windows, emotions, modes), durable state, external actions, the
//! relay wire protocol, injected capabilities and configuration.

pub mod action;
pub mod capability;
pub mod config;
pub mod durable;
pub mod relay;
pub mod state;

pub use action::{Action, ActionError, ActionPacket, CommandSource};
pub use capability::{Capability, Notifier, Permission};
pub use config::AndroConfig;
pub use durable::{DurableState, Mood, RoutineLedger};
pub use relay::{CreatureStatus, PeerRole, RelayMessage};
pub use state::{
    DriveState, Emotion, Environment, Millis, Mode, ModeProfile, SystemMode, TransientWindows,
    WindowKind,
};
