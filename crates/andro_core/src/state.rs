//! Session-scoped creature state
//!
//! Everything in this module lives for exactly one session: drives, the
//! environment snapshot and the transient window set are rebuilt from
//! defaults whenever an engine instance is constructed. Durable state lives in
//! [`crate::durable`].

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch (or since an arbitrary virtual origin in tests).
pub type Millis = i64;

/// Upper bound shared by every drive.
pub const DRIVE_MAX: f32 = 100.0;

/// Guard against NaN and Infinity in drive values.
#[inline]
fn sanitize(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("Non-finite drive value detected, resetting to {}", fallback);
        fallback
    }
}

// =============================================================================
// Drives
// =============================================================================

/// Internal needs that decay and grow with idle time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveState {
    /// Energy (0 - 100): drains every cognition tick, refilled by wake and feed
    pub energy: f32,

    /// Curiosity (0 - 100): grows with idle time, spent by the "wide" expression
    pub curiosity: f32,

    /// Social need (0 - 100): grows when alone, drops sharply with presence or feed
    pub social_need: f32,

    /// Whether the creature is asleep. Cleared only by an explicit wake.
    pub sleeping: bool,

    pub last_interaction_at: Millis,
    pub last_wake_at: Millis,
}

impl DriveState {
    pub const DEFAULT_ENERGY: f32 = 80.0;
    pub const DEFAULT_CURIOSITY: f32 = 40.0;
    pub const DEFAULT_SOCIAL_NEED: f32 = 30.0;

    /// Fresh drives for a session starting at `now`.
    pub fn new(now: Millis) -> Self {
        Self {
            energy: Self::DEFAULT_ENERGY,
            curiosity: Self::DEFAULT_CURIOSITY,
            social_need: Self::DEFAULT_SOCIAL_NEED,
            sleeping: false,
            last_interaction_at: now,
            last_wake_at: now,
        }
    }

    /// Clamp every bounded drive to [0, 100].
    pub fn normalize(&mut self) {
        self.energy = sanitize(self.energy, Self::DEFAULT_ENERGY).clamp(0.0, DRIVE_MAX);
        self.curiosity = sanitize(self.curiosity, Self::DEFAULT_CURIOSITY).clamp(0.0, DRIVE_MAX);
        self.social_need =
            sanitize(self.social_need, Self::DEFAULT_SOCIAL_NEED).clamp(0.0, DRIVE_MAX);
    }

    /// Milliseconds since the last interaction (never negative).
    pub fn idle_ms(&self, now: Millis) -> Millis {
        (now - self.last_interaction_at).max(0)
    }

    pub fn in_bounds(&self) -> bool {
        let ok = |v: f32| v.is_finite() && (0.0..=DRIVE_MAX).contains(&v);
        ok(self.energy) && ok(self.curiosity) && ok(self.social_need)
    }
}

impl Default for DriveState {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Coarse activity label published to collaborators. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemMode {
    Active,
    Idle,
    Sleep,
}

// =============================================================================
// Environment
// =============================================================================

/// The normalized sensor snapshot. Overwritten as a whole on every sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Motion intensity (non-negative)
    pub motion: f32,
    /// Device tilt, degrees (front/back and left/right)
    pub tilt_x: f32,
    pub tilt_y: f32,
    /// Rotation rate around the vertical axis, degrees per second
    pub rotation: f32,
    /// Loudness on a 0 - 100 scale
    pub loudness: f32,
    /// Mean luminance, 0 - 1
    pub brightness: f32,
    pub presence: bool,
    /// Horizontal presence position, 0 (left) - 1 (right)
    pub presence_x: f32,
    pub online: bool,
    /// Battery level 0 - 1, `None` when unknown
    pub power_level: Option<f32>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            motion: 0.0,
            tilt_x: 0.0,
            tilt_y: 0.0,
            rotation: 0.0,
            loudness: 0.0,
            brightness: 0.0,
            presence: false,
            presence_x: 0.5,
            online: true,
            power_level: None,
        }
    }
}

impl Environment {
    /// Power level below which the creature shuts down into the low-battery face.
    pub const CRITICAL_POWER: f32 = 0.12;
    /// Power level below which visuals are dimmed and slowed.
    pub const LOW_POWER: f32 = 0.2;

    pub fn is_critical_power(&self) -> bool {
        matches!(self.power_level, Some(level) if level < Self::CRITICAL_POWER)
    }

    pub fn is_low_power(&self) -> bool {
        matches!(self.power_level, Some(level) if level < Self::LOW_POWER)
    }
}

// =============================================================================
// Transient windows
// =============================================================================

/// Kinds of short-lived reactive states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    MotionShock,
    Alert,
    Confused,
    Annoyed,
    Happy,
    Speaking,
    Listening,
    WakeGlow,
}

impl WindowKind {
    pub const ALL: [WindowKind; 8] = [
        WindowKind::MotionShock,
        WindowKind::Alert,
        WindowKind::Confused,
        WindowKind::Annoyed,
        WindowKind::Happy,
        WindowKind::Speaking,
        WindowKind::Listening,
        WindowKind::WakeGlow,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// One expiry timestamp per window kind. A window is active iff `now < expiry`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransientWindows {
    expiry: [Millis; 8],
}

impl TransientWindows {
    pub fn is_active(&self, kind: WindowKind, now: Millis) -> bool {
        now < self.expiry[kind.index()]
    }

    /// Open (or extend) a window so it stays active for `duration_ms` from `now`.
    /// Never shortens an already longer window.
    pub fn open(&mut self, kind: WindowKind, now: Millis, duration_ms: Millis) {
        let slot = &mut self.expiry[kind.index()];
        *slot = (*slot).max(now + duration_ms);
    }

    pub fn close(&mut self, kind: WindowKind) {
        self.expiry[kind.index()] = 0;
    }

    pub fn expiry(&self, kind: WindowKind) -> Millis {
        self.expiry[kind.index()]
    }

    /// Kinds active at `now`, in declaration order.
    pub fn active(&self, now: Millis) -> Vec<WindowKind> {
        WindowKind::ALL
            .into_iter()
            .filter(|k| self.is_active(*k, now))
            .collect()
    }
}

// =============================================================================
// Emotion
// =============================================================================

/// The closed set of expressions. Exactly one is shown per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Emotion {
    Neutral,
    Sleepy,
    /// Wide-eyed curiosity
    Wide,
    Dizzy,
    LowBattery,
    Listening,
    Speaking,
    Alert,
    Confused,
    Annoyed,
    Happy,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Sleepy => "sleepy",
            Emotion::Wide => "wide",
            Emotion::Dizzy => "dizzy",
            Emotion::LowBattery => "low-battery",
            Emotion::Listening => "listening",
            Emotion::Speaking => "speaking",
            Emotion::Alert => "alert",
            Emotion::Confused => "confused",
            Emotion::Annoyed => "annoyed",
            Emotion::Happy => "happy",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Modes
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Chill,
    Focus,
    Night,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Chill => "chill",
            Mode::Focus => "focus",
            Mode::Night => "night",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chill" => Some(Mode::Chill),
            "focus" => Some(Mode::Focus),
            "night" => Some(Mode::Night),
            _ => None,
        }
    }

    /// Movement and cadence bounds for this mode.
    pub fn profile(&self) -> ModeProfile {
        match self {
            Mode::Chill => ModeProfile {
                move_min: 14.0,
                move_max: 32.0,
                move_delay_min: 1200,
                move_delay_max: 3200,
                blink_min: 2800,
                blink_var: 1800,
                expression_ms: 12_000,
            },
            Mode::Focus => ModeProfile {
                move_min: 6.0,
                move_max: 18.0,
                move_delay_min: 2000,
                move_delay_max: 3600,
                blink_min: 3400,
                blink_var: 2000,
                expression_ms: 15_000,
            },
            Mode::Night => ModeProfile {
                move_min: 2.0,
                move_max: 10.0,
                move_delay_min: 2600,
                move_delay_max: 4200,
                blink_min: 4500,
                blink_var: 2600,
                expression_ms: 18_000,
            },
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-mode movement bounds and cadences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeProfile {
    /// Look-offset bounds, pixels
    pub move_min: f32,
    pub move_max: f32,
    /// Random retarget delay bounds, ms
    pub move_delay_min: Millis,
    pub move_delay_max: Millis,
    /// Base blink interval and its random spread, ms
    pub blink_min: Millis,
    pub blink_var: Millis,
    pub expression_ms: Millis,
}

impl ModeProfile {
    /// Dimmed, slowed variant used while the battery is low.
    pub fn low_power(&self) -> Self {
        Self {
            move_min: (self.move_min * 0.65).floor().max(2.0),
            move_max: (self.move_max * 0.7).floor().max(8.0),
            move_delay_min: self.move_delay_min + 800,
            move_delay_max: self.move_delay_max + 1200,
            blink_min: self.blink_min + 1000,
            blink_var: self.blink_var,
            expression_ms: self.expression_ms + 3500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_drives_in_bounds() {
        let drives = DriveState::new(1_000);
        assert!(drives.in_bounds());
        assert!(!drives.sleeping);
        assert_eq!(drives.idle_ms(4_000), 3_000);
    }

    #[test]
    fn test_normalize_clamps_and_sanitizes() {
        let mut drives = DriveState::default();
        drives.energy = -5.0;
        drives.curiosity = 140.0;
        drives.social_need = f32::NAN;
        drives.normalize();
        assert_eq!(drives.energy, 0.0);
        assert_eq!(drives.curiosity, 100.0);
        assert_eq!(drives.social_need, DriveState::DEFAULT_SOCIAL_NEED);
    }

    #[test]
    fn test_window_open_and_expire() {
        let mut windows = TransientWindows::default();
        assert!(!windows.is_active(WindowKind::Alert, 0));
        windows.open(WindowKind::Alert, 1_000, 1_600);
        assert!(windows.is_active(WindowKind::Alert, 2_599));
        assert!(!windows.is_active(WindowKind::Alert, 2_600));
        assert_eq!(windows.active(2_000), vec![WindowKind::Alert]);
    }

    #[test]
    fn test_window_open_never_shortens() {
        let mut windows = TransientWindows::default();
        windows.open(WindowKind::Happy, 0, 5_000);
        windows.open(WindowKind::Happy, 1_000, 1_000);
        assert_eq!(windows.expiry(WindowKind::Happy), 5_000);
    }

    #[test]
    fn test_power_thresholds() {
        let mut env = Environment::default();
        assert!(!env.is_low_power());
        env.power_level = Some(0.15);
        assert!(env.is_low_power());
        assert!(!env.is_critical_power());
        env.power_level = Some(0.05);
        assert!(env.is_critical_power());
    }

    #[test]
    fn test_low_power_profile() {
        let chill = Mode::Chill.profile().low_power();
        assert_eq!(chill.move_min, 9.0);
        assert_eq!(chill.move_max, 22.0);
        assert_eq!(chill.blink_min, 3800);
        let night = Mode::Night.profile().low_power();
        assert_eq!(night.move_min, 2.0);
        assert_eq!(night.move_max, 8.0);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(Mode::parse(" Focus "), Some(Mode::Focus));
        assert_eq!(Mode::parse("party"), None);
    }

    #[test]
    fn test_emotion_serde_names() {
        let json = serde_json::to_string(&Emotion::LowBattery).unwrap();
        assert_eq!(json, "\"low-battery\"");
        assert_eq!(Emotion::Wide.to_string(), "wide");
    }
}
