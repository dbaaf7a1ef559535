//! Drive model
//!
//! Energy drains at a fixed rate, curiosity and social need grow while the
//! creature is left alone and relax while someone is around. The rates are per
//! cognition interval, not per second.

use andro_core::{DriveState, Millis, SystemMode, TransientWindows, WindowKind};

pub const ENERGY_DRAIN: f32 = 0.3;
pub const CURIOSITY_GROWTH: f32 = 0.6;
pub const CURIOSITY_RELAX: f32 = 0.25;
pub const SOCIAL_GROWTH: f32 = 0.8;
pub const SOCIAL_RELAX: f32 = 0.3;

/// Idle time after which curiosity starts growing.
pub const CURIOUS_AFTER_MS: Millis = 30_000;
/// Idle time after which social need starts growing.
pub const LONELY_AFTER_MS: Millis = 45_000;
/// Idle time after which the published mode reads IDLE.
pub const IDLE_AFTER_MS: Millis = 25_000;
/// Energy at or below which the creature falls asleep.
pub const ENERGY_FLOOR: f32 = 25.0;

pub const WAKE_ENERGY_BOOST: f32 = 15.0;
pub const WAKE_CURIOSITY: f32 = 20.0;
pub const WAKE_GLOW_MS: Millis = 1_800;

/// A wake that happened, reported so the animation layer can react.
#[derive(Debug, Clone, PartialEq)]
pub struct WakeEvent {
    pub reason: String,
    pub was_sleeping: bool,
    pub at: Millis,
}

/// Periodic drive decay.
#[derive(Debug, Clone)]
pub struct DriveModel {
    /// Idle interaction after which the creature falls asleep
    pub inactivity_sleep_ms: Millis,
}

impl Default for DriveModel {
    fn default() -> Self {
        Self {
            inactivity_sleep_ms: 20 * 60 * 1000,
        }
    }
}

impl DriveModel {
    pub fn new(inactivity_sleep_ms: Millis) -> Self {
        Self {
            inactivity_sleep_ms,
        }
    }

    /// One decay step. Returns the coarse mode label for collaborators.
    pub fn decay(&self, drives: &mut DriveState, now: Millis) -> SystemMode {
        drives.energy -= ENERGY_DRAIN;

        let idle = drives.idle_ms(now);
        if idle > CURIOUS_AFTER_MS {
            drives.curiosity += CURIOSITY_GROWTH;
        } else {
            drives.curiosity -= CURIOSITY_RELAX;
        }
        if idle > LONELY_AFTER_MS {
            drives.social_need += SOCIAL_GROWTH;
        } else {
            drives.social_need -= SOCIAL_RELAX;
        }
        drives.normalize();

        if !drives.sleeping {
            if drives.energy <= ENERGY_FLOOR {
                tracing::info!("Energy at {:.1}, falling asleep", drives.energy);
                drives.sleeping = true;
            } else if idle > self.inactivity_sleep_ms {
                tracing::info!("Idle for {}s, falling asleep", idle / 1000);
                drives.sleeping = true;
            }
        }

        system_mode(drives, now)
    }
}

/// ACTIVE / IDLE / SLEEP label derived from the sleeping flag and idle time.
pub fn system_mode(drives: &DriveState, now: Millis) -> SystemMode {
    if drives.sleeping {
        SystemMode::Sleep
    } else if drives.idle_ms(now) > IDLE_AFTER_MS {
        SystemMode::Idle
    } else {
        SystemMode::Active
    }
}

/// Wake the creature. Applies every drive-side effect and opens the wake glow;
/// the caller handles blinks, the scan sequence and the haptic pulse.
pub fn wake(
    drives: &mut DriveState,
    windows: &mut TransientWindows,
    reason: &str,
    now: Millis,
) -> WakeEvent {
    let was_sleeping = drives.sleeping;
    drives.sleeping = false;
    drives.energy = (drives.energy + WAKE_ENERGY_BOOST).min(100.0);
    drives.curiosity = WAKE_CURIOSITY;
    drives.last_wake_at = now;
    drives.last_interaction_at = now;
    drives.normalize();
    windows.open(WindowKind::WakeGlow, now, WAKE_GLOW_MS);

    if was_sleeping {
        tracing::info!("Woke up ({})", reason);
    } else {
        tracing::debug!("Wake refresh while awake ({})", reason);
    }

    WakeEvent {
        reason: reason.to_string(),
        was_sleeping,
        at: now,
    }
}
