//! Transient event tracker
//!
//! Maps each snapshot into short-lived windows (dizzy after a shake, alert
//! after a nudge, annoyed after sustained noise) and keeps the noisy/silent
//! hysteresis scores. Wakes triggered here go through [`crate::drives::wake`]
//! and are handed back to the caller as [`WakeEvent`]s.

use crate::drives::{self, WakeEvent};
use andro_core::{DriveState, Environment, Millis, TransientWindows, WindowKind};

pub const SHOCK_INTENSITY: f32 = 18.0;
pub const ALERT_INTENSITY_MIN: f32 = 6.0;
pub const ALERT_INTENSITY_MAX: f32 = 14.0;
pub const STILL_INTENSITY: f32 = 1.0;

pub const LOUD_THRESHOLD: f32 = 72.0;
pub const NOISY_THRESHOLD: f32 = 45.0;
pub const QUIET_THRESHOLD: f32 = 12.0;
pub const ANNOYED_SCORE: f32 = 55.0;
pub const SILENT_SCORE: f32 = 50.0;

pub const SPIN_RATE: f32 = 280.0;

pub const MOTION_SHOCK_MS: Millis = 2_000;
pub const ALERT_MS: Millis = 1_600;
pub const ANNOYED_MS: Millis = 2_200;
pub const CONFUSED_MS: Millis = 1_800;
pub const LISTENING_MS: Millis = 1_600;
pub const SPEAKING_MS: Millis = 2_000;

const SCORE_MAX: f32 = 100.0;

/// Hysteresis and flag state carried between cognition ticks.
#[derive(Debug, Clone)]
pub struct TransientTracker {
    pub noisy: f32,
    pub silent: f32,
    /// Last tick was above the loud threshold
    pub loud: bool,
    still_since: Millis,
    inactivity_sleep_ms: Millis,
}

impl TransientTracker {
    pub fn new(now: Millis, inactivity_sleep_ms: Millis) -> Self {
        Self {
            noisy: 0.0,
            silent: 0.0,
            loud: false,
            still_since: now,
            inactivity_sleep_ms,
        }
    }

    pub fn still_since(&self) -> Millis {
        self.still_since
    }

    /// Restart the stillness clock. Called on every wake so a sound that wakes
    /// a motionless creature doesn't put it straight back to sleep.
    pub fn reset_stillness(&mut self, now: Millis) {
        self.still_since = now;
    }

    /// Apply one snapshot. Returns the wakes it caused, in order.
    pub fn observe(
        &mut self,
        env: &Environment,
        drives: &mut DriveState,
        windows: &mut TransientWindows,
        now: Millis,
    ) -> Vec<WakeEvent> {
        let mut woke = Vec::new();
        let intensity = env.motion;

        // Motion
        if intensity > SHOCK_INTENSITY {
            windows.open(WindowKind::MotionShock, now, MOTION_SHOCK_MS);
            woke.push(drives::wake(drives, windows, "motion shock", now));
            self.still_since = now;
        } else if (ALERT_INTENSITY_MIN..=ALERT_INTENSITY_MAX).contains(&intensity) {
            windows.open(WindowKind::Alert, now, ALERT_MS);
        }

        // Sound
        if env.loudness > LOUD_THRESHOLD {
            self.loud = true;
            windows.open(WindowKind::MotionShock, now, MOTION_SHOCK_MS);
            woke.push(drives::wake(drives, windows, "loud sound", now));
            self.still_since = now;
        } else {
            self.loud = false;
        }

        if env.loudness > NOISY_THRESHOLD {
            self.noisy = (self.noisy + 4.0).min(SCORE_MAX);
            self.silent = (self.silent - 3.0).max(0.0);
        } else if env.loudness < QUIET_THRESHOLD {
            self.silent = (self.silent + 3.0).min(SCORE_MAX);
            self.noisy = (self.noisy - 2.0).max(0.0);
        } else {
            self.noisy = (self.noisy - 1.0).max(0.0);
            self.silent = (self.silent - 1.0).max(0.0);
        }

        if self.noisy > ANNOYED_SCORE {
            windows.open(WindowKind::Annoyed, now, ANNOYED_MS);
        }
        if self.silent > SILENT_SCORE && !drives.sleeping {
            drives.energy -= 0.5;
        }

        // Presence
        if env.presence {
            drives.social_need -= 2.8;
            drives.last_interaction_at = now;
        } else {
            drives.curiosity += 0.2;
        }

        // Orientation
        if env.rotation.abs() > SPIN_RATE || windows.is_active(WindowKind::Confused, now) {
            windows.open(WindowKind::Confused, now, CONFUSED_MS);
            drives.curiosity += 0.3;
        }

        // Stillness
        if intensity >= STILL_INTENSITY {
            self.still_since = now;
        } else if now - self.still_since > self.inactivity_sleep_ms && !drives.sleeping {
            tracing::info!(
                "Motionless for {}s, falling asleep",
                (now - self.still_since) / 1000
            );
            drives.sleeping = true;
        }

        drives.normalize();
        woke
    }

    /// Voice activity from the microphone.
    pub fn voice_activity(&mut self, windows: &mut TransientWindows, now: Millis) {
        windows.open(WindowKind::Listening, now, LISTENING_MS);
    }

    /// The creature itself is talking.
    pub fn speech(&mut self, windows: &mut TransientWindows, now: Millis) {
        windows.open(WindowKind::Speaking, now, SPEAKING_MS);
    }

    /// Discrete shake gesture.
    pub fn shake(
        &mut self,
        drives: &mut DriveState,
        windows: &mut TransientWindows,
        now: Millis,
    ) -> WakeEvent {
        windows.open(WindowKind::MotionShock, now, MOTION_SHOCK_MS);
        self.still_since = now;
        drives::wake(drives, windows, "shake", now)
    }
}
