//! # Andro expression
//!
//! Everything between the resolved emotion and the render sink: blink cadence,
//! look-target choreography and sleep markers ([`animation`]), free-text
//! commands ([`command`]), daily routines ([`routine`]) and the [`Creature`]
//! engine that owns one creature's state and drives all of it from a
//! deterministic clock.

pub mod animation;
pub mod command;
pub mod creature;
pub mod routine;

pub use animation::{Animator, Frame, ScanSequence, SleepIndicator};
pub use command::{interpret, Intent};
pub use creature::{Creature, CreatureConfig, DeviceCapabilities, Effect, CREATURE_NAME};
pub use routine::{RoutineContext, RoutineEvent, RoutineScheduler};
