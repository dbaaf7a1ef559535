//! # Andro limbic
//!
//! The fast, deterministic half of the creature. Raw samples are normalized
//! into an environment snapshot, the transient tracker turns that into
//! short-lived windows, the drive model decays, and the resolver picks exactly
//! one emotion per cognition tick.
//!
//! ```text
//! sensors -> normalizer -> transient tracker -> drive model -> resolver
//! ```

pub mod drives;
pub mod heartbeat;
pub mod resolver;
pub mod sensors;
pub mod system;
pub mod transient;

pub use drives::{DriveModel, WakeEvent};
pub use heartbeat::{HeartbeatConfig, TaskQueue};
pub use resolver::{resolve, ResolverInput, Rule, PRIORITY};
pub use sensors::{LumaFrame, RawSample, SensorNormalizer};
pub use system::{CognitionReport, LimbicSystem};
pub use transient::TransientTracker;
