//! Emotion resolver
//!
//! A fixed priority list; the first rule that holds picks the expression.
//! Both the rule predicate and the rule-to-emotion mapping are exhaustive
//! matches, so adding a rule without wiring it fails to compile.

use andro_core::{DriveState, Emotion, Environment, Millis, TransientWindows, WindowKind};

/// Curiosity above which the creature goes wide-eyed.
pub const WIDE_CURIOSITY: f32 = 70.0;
/// Curiosity left after the wide expression has been shown.
pub const SPENT_CURIOSITY: f32 = 32.0;

/// Everything resolution looks at, captured at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolverInput {
    pub low_power: bool,
    pub sleeping: bool,
    pub motion_shock: bool,
    pub listening: bool,
    pub speaking: bool,
    pub presence: bool,
    pub annoyed: bool,
    pub confused: bool,
    pub offline: bool,
    pub alert: bool,
    pub curiosity: f32,
    pub happy: bool,
}

impl ResolverInput {
    pub fn capture(
        drives: &DriveState,
        env: &Environment,
        windows: &TransientWindows,
        now: Millis,
    ) -> Self {
        Self {
            low_power: env.is_critical_power(),
            sleeping: drives.sleeping,
            motion_shock: windows.is_active(WindowKind::MotionShock, now),
            listening: windows.is_active(WindowKind::Listening, now),
            speaking: windows.is_active(WindowKind::Speaking, now),
            presence: env.presence,
            annoyed: windows.is_active(WindowKind::Annoyed, now),
            confused: windows.is_active(WindowKind::Confused, now),
            offline: !env.online,
            alert: windows.is_active(WindowKind::Alert, now),
            curiosity: drives.curiosity,
            happy: windows.is_active(WindowKind::Happy, now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    LowPower,
    Sleeping,
    MotionShock,
    Listening,
    Speaking,
    Presence,
    Annoyed,
    ConfusedOrOffline,
    Alert,
    Curious,
    HappyWindow,
    Fallback,
}

/// Highest priority first.
pub const PRIORITY: [Rule; 12] = [
    Rule::LowPower,
    Rule::Sleeping,
    Rule::MotionShock,
    Rule::Listening,
    Rule::Speaking,
    Rule::Presence,
    Rule::Annoyed,
    Rule::ConfusedOrOffline,
    Rule::Alert,
    Rule::Curious,
    Rule::HappyWindow,
    Rule::Fallback,
];

impl Rule {
    pub fn holds(self, input: &ResolverInput) -> bool {
        match self {
            Rule::LowPower => input.low_power,
            Rule::Sleeping => input.sleeping,
            Rule::MotionShock => input.motion_shock,
            Rule::Listening => input.listening,
            Rule::Speaking => input.speaking,
            Rule::Presence => input.presence,
            Rule::Annoyed => input.annoyed,
            Rule::ConfusedOrOffline => input.confused || input.offline,
            Rule::Alert => input.alert,
            Rule::Curious => input.curiosity > WIDE_CURIOSITY,
            Rule::HappyWindow => input.happy,
            Rule::Fallback => true,
        }
    }

    pub fn emotion(self) -> Emotion {
        match self {
            Rule::LowPower => Emotion::LowBattery,
            Rule::Sleeping => Emotion::Sleepy,
            Rule::MotionShock => Emotion::Dizzy,
            Rule::Listening => Emotion::Listening,
            Rule::Speaking => Emotion::Speaking,
            Rule::Presence => Emotion::Happy,
            Rule::Annoyed => Emotion::Annoyed,
            Rule::ConfusedOrOffline => Emotion::Confused,
            Rule::Alert => Emotion::Alert,
            Rule::Curious => Emotion::Wide,
            Rule::HappyWindow => Emotion::Happy,
            Rule::Fallback => Emotion::Neutral,
        }
    }
}

/// The rule that decides `input`.
pub fn winning_rule(input: &ResolverInput) -> Rule {
    PRIORITY
        .into_iter()
        .find(|rule| rule.holds(input))
        .unwrap_or(Rule::Fallback)
}

/// Pure resolution. The curiosity spend after `Wide` is the caller's job.
pub fn resolve(input: &ResolverInput) -> Emotion {
    winning_rule(input).emotion()
}
