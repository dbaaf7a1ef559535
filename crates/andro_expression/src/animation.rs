//! Animation scheduler
//!
//! Turns the resolved emotion plus the environment into per-frame render
//! parameters: horizontal look offset, tilt skew, lid state, opacity and the
//! floating sleep markers. Timing of one-shot events (blinks, retargets, sleep
//! markers) is owned by the engine's task queue; this module supplies the
//! delays and applies the effects.

use andro_core::{Emotion, Environment, Millis, ModeProfile};
use rand::Rng;
use serde::Serialize;

pub const BLINK_CLOSED_MS: Millis = 150;
pub const WAKE_BLINK_GAP_MS: Millis = 230;

pub const POSITION_SMOOTHING: f32 = 0.08;
pub const SKEW_SMOOTHING: f32 = 0.12;
pub const TILT_BIAS_GAIN: f32 = 0.6;
pub const TILT_BIAS_MAX: f32 = 12.0;
pub const SKEW_GAIN: f32 = 0.35;
pub const SKEW_MAX: f32 = 8.0;

pub const MANUAL_LOOK_LIMIT: f32 = 50.0;
pub const MANUAL_LOOK_MS: Millis = 4_000;

pub const SLEEP_INDICATOR_EVERY_MS: Millis = 1_500;
pub const SLEEP_INDICATOR_LIFETIME_MS: Millis = 2_400;

pub const LOW_POWER_OPACITY: f32 = 0.55;

/// Share of the viewport width the eyes may wander, percent.
const VIEWPORT_MOVE_PERCENT: f32 = 4.0;

/// Wake scan keyframes: (elapsed ms, fraction of max move).
pub const SCAN_KEYFRAMES: [(Millis, f32); 5] =
    [(0, 0.0), (280, -1.0), (700, 1.0), (1050, -0.35), (1300, 0.0)];

fn ease_in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Look-around sweep played on wake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSequence {
    pub started_at: Millis,
    pub amplitude: f32,
}

impl ScanSequence {
    pub fn new(started_at: Millis, amplitude: f32) -> Self {
        Self {
            started_at,
            amplitude,
        }
    }

    /// Offset at `now`, or `None` once the last keyframe has elapsed.
    pub fn offset(&self, now: Millis) -> Option<f32> {
        let elapsed = (now - self.started_at).max(0);
        let last = SCAN_KEYFRAMES[SCAN_KEYFRAMES.len() - 1];
        if elapsed >= last.0 {
            return None;
        }
        for pair in SCAN_KEYFRAMES.windows(2) {
            let (t0, v0) = pair[0];
            let (t1, v1) = pair[1];
            if elapsed < t1 {
                let t = (elapsed - t0) as f32 / (t1 - t0) as f32;
                let v = v0 + (v1 - v0) * ease_in_out_cubic(t);
                return Some(v * self.amplitude);
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// A floating "z" shown while sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SleepIndicator {
    pub id: u64,
    pub side: Side,
    /// Horizontal position as a fraction of the viewport
    pub x: f32,
    pub born_at: Millis,
}

/// Everything a render sink needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub at: Millis,
    pub emotion: Emotion,
    pub look_x: f32,
    pub skew_deg: f32,
    pub lids_closed: bool,
    pub opacity: f32,
    pub wake_glow: bool,
    pub sleep_indicators: Vec<SleepIndicator>,
}

/// Per-instance animation state.
#[derive(Debug, Clone)]
pub struct Animator {
    viewport_width: f32,
    look_x: f32,
    skew: f32,
    random_target: f32,
    scan: Option<ScanSequence>,
    manual: Option<(f32, Millis)>,
    lids_closed: bool,
    indicators: Vec<SleepIndicator>,
    next_indicator_id: u64,
}

impl Animator {
    pub fn new(viewport_width: f32) -> Self {
        Self {
            viewport_width,
            look_x: 0.0,
            skew: 0.0,
            random_target: 0.0,
            scan: None,
            manual: None,
            lids_closed: false,
            indicators: Vec::new(),
            next_indicator_id: 0,
        }
    }

    /// Largest horizontal offset for this profile and viewport.
    pub fn max_move(&self, profile: &ModeProfile) -> f32 {
        (self.viewport_width * VIEWPORT_MOVE_PERCENT / 100.0)
            .floor()
            .clamp(profile.move_min, profile.move_max.max(profile.move_min))
    }

    // ------------------------------------------------------------------
    // Timing
    // ------------------------------------------------------------------

    /// Delay until the next blink for the shown emotion.
    pub fn blink_delay<R: Rng>(emotion: Emotion, profile: &ModeProfile, rng: &mut R) -> Millis {
        match emotion {
            Emotion::Sleepy => rng.gen_range(5_000..=7_000),
            Emotion::Wide => rng.gen_range(2_500..=3_600),
            Emotion::Annoyed => rng.gen_range(7_000..=9_000),
            Emotion::Dizzy => rng.gen_range(1_200..=2_000),
            _ => profile.blink_min + rng.gen_range(0..=profile.blink_var.max(0)),
        }
    }

    pub fn retarget_delay<R: Rng>(profile: &ModeProfile, rng: &mut R) -> Millis {
        let lo = profile.move_delay_min.min(profile.move_delay_max);
        rng.gen_range(lo..=profile.move_delay_max.max(lo))
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn close_lids(&mut self) {
        self.lids_closed = true;
    }

    pub fn open_lids(&mut self) {
        self.lids_closed = false;
    }

    pub fn lids_closed(&self) -> bool {
        self.lids_closed
    }

    pub fn start_scan(&mut self, now: Millis, profile: &ModeProfile) {
        self.scan = Some(ScanSequence::new(now, profile.move_max));
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.is_some()
    }

    /// Pick a fresh random look target. Sleeping creatures look straight ahead.
    pub fn retarget<R: Rng>(&mut self, profile: &ModeProfile, sleeping: bool, rng: &mut R) {
        self.random_target = if sleeping {
            0.0
        } else {
            let max = self.max_move(profile);
            rng.gen_range(-max..=max)
        };
    }

    /// Hold the gaze at `x` for a while.
    pub fn pin_look(&mut self, x: f32, now: Millis) {
        let x = if x.is_finite() { x } else { 0.0 };
        self.manual = Some((x.clamp(-MANUAL_LOOK_LIMIT, MANUAL_LOOK_LIMIT), now + MANUAL_LOOK_MS));
    }

    pub fn spawn_sleep_indicator<R: Rng>(&mut self, now: Millis, rng: &mut R) -> SleepIndicator {
        let side = if rng.gen_bool(0.5) { Side::Left } else { Side::Right };
        let x = match side {
            Side::Left => rng.gen_range(0.08..0.28),
            Side::Right => rng.gen_range(0.72..0.92),
        };
        let indicator = SleepIndicator {
            id: self.next_indicator_id,
            side,
            x,
            born_at: now,
        };
        self.next_indicator_id += 1;
        self.indicators.push(indicator);
        indicator
    }

    pub fn sleep_indicators(&self) -> &[SleepIndicator] {
        &self.indicators
    }

    // ------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------

    /// Where the eyes want to be right now, before smoothing.
    pub fn look_target(
        &mut self,
        now: Millis,
        env: &Environment,
        profile: &ModeProfile,
        sleeping: bool,
    ) -> f32 {
        let max = self.max_move(profile);
        let base = if let Some(offset) = self.scan.and_then(|s| s.offset(now)) {
            offset
        } else {
            self.scan = None;
            match self.manual {
                Some((x, until)) if now < until => x,
                _ => {
                    self.manual = None;
                    if sleeping {
                        0.0
                    } else if env.presence {
                        (env.presence_x - 0.5) * 2.0 * max
                    } else {
                        self.random_target
                    }
                }
            }
        };
        let bias = (env.tilt_x * TILT_BIAS_GAIN).clamp(-TILT_BIAS_MAX, TILT_BIAS_MAX);
        base + bias
    }

    /// Advance smoothing one frame and produce render parameters.
    pub fn frame(
        &mut self,
        now: Millis,
        emotion: Emotion,
        env: &Environment,
        profile: &ModeProfile,
        sleeping: bool,
        wake_glow: bool,
    ) -> Frame {
        let target = self.look_target(now, env, profile, sleeping);
        self.look_x += (target - self.look_x) * POSITION_SMOOTHING;

        let skew_target = (env.tilt_x * SKEW_GAIN).clamp(-SKEW_MAX, SKEW_MAX);
        self.skew += (skew_target - self.skew) * SKEW_SMOOTHING;

        self.indicators
            .retain(|z| now - z.born_at < SLEEP_INDICATOR_LIFETIME_MS);

        Frame {
            at: now,
            emotion,
            look_x: self.look_x,
            skew_deg: self.skew,
            lids_closed: self.lids_closed && !sleeping,
            opacity: if env.is_low_power() {
                LOW_POWER_OPACITY
            } else {
                1.0
            },
            wake_glow,
            sleep_indicators: self.indicators.clone(),
        }
    }

    pub fn look_x(&self) -> f32 {
        self.look_x
    }
}

impl Default for Animator {
    fn default() -> Self {
        Self::new(800.0)
    }
}
