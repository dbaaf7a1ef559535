//! Property-based tests for andro_core.

use andro_core::{DriveState, DurableState, Mode, Mood, RoutineLedger, TransientWindows, WindowKind};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_mode() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Chill), Just(Mode::Focus), Just(Mode::Night)]
}

fn arb_mood() -> impl Strategy<Value = Mood> {
    prop_oneof![
        Just(Mood::Calm),
        Just(Mood::Happy),
        Just(Mood::Engaged),
        Just(Mood::Cozy),
        Just(Mood::Focus),
        Just(Mood::Night),
        Just(Mood::LowPower),
    ]
}

fn arb_ledger() -> impl Strategy<Value = RoutineLedger> {
    ("[0-9]{4}-[0-9]{2}-[0-9]{2}", 0i64..1 << 42, 0i64..1 << 42, 0i64..1 << 42).prop_map(
        |(day, hydration, brk, weather)| RoutineLedger {
            last_morning_day: day.clone(),
            last_bedtime_day: day,
            last_hydration_at: hydration,
            last_break_at: brk,
            last_weather_at: weather,
        },
    )
}

fn arb_durable() -> impl Strategy<Value = DurableState> {
    (
        arb_mode(),
        arb_mood(),
        any::<u32>(),
        any::<bool>(),
        any::<bool>(),
        proptest::option::of(0.0f32..=1.0),
        proptest::option::of(0u16..100),
        proptest::collection::vec("[a-z ]{0,20}", 0..40),
        arb_ledger(),
    )
        .prop_map(
            |(mode, mood, care_points, voice, notify, battery, code, memory, routine)| {
                DurableState {
                    mode,
                    mood,
                    care_points,
                    voice_enabled: voice,
                    notifications_enabled: notify,
                    weather_enabled: !notify,
                    battery_level: battery,
                    last_weather_code: code,
                    memory,
                    notes: Vec::new(),
                    routine,
                }
            },
        )
}

// ============================================================================
// Drives
// ============================================================================

proptest! {
    /// normalize always lands every drive in [0, 100], whatever went in.
    #[test]
    fn normalize_bounds_drives(
        energy in prop::num::f32::ANY,
        curiosity in prop::num::f32::ANY,
        social in prop::num::f32::ANY,
    ) {
        let mut d = DriveState::new(0);
        d.energy = energy;
        d.curiosity = curiosity;
        d.social_need = social;
        d.normalize();
        prop_assert!(d.in_bounds(), "out of bounds: {:?}", d);
    }

    /// Idle time is never negative, even with a clock that went backwards.
    #[test]
    fn idle_never_negative(last in any::<i64>().prop_map(|v| v / 4), now in any::<i64>().prop_map(|v| v / 4)) {
        let mut d = DriveState::new(0);
        d.last_interaction_at = last;
        prop_assert!(d.idle_ms(now) >= 0);
    }
}

// ============================================================================
// Transient windows
// ============================================================================

proptest! {
    /// A window is active exactly within [now, now + duration).
    #[test]
    fn window_active_until_expiry(now in 0i64..1 << 40, duration in 1i64..100_000, probe in 0i64..200_000) {
        let mut windows = TransientWindows::default();
        windows.open(WindowKind::Alert, now, duration);
        let at = now + probe;
        prop_assert_eq!(windows.is_active(WindowKind::Alert, at), probe < duration);
        prop_assert!(!windows.is_active(WindowKind::Annoyed, at));
    }
}

// ============================================================================
// Durable state
// ============================================================================

proptest! {
    /// Whatever we save loads back unchanged.
    #[test]
    fn durable_survives_save_and_load(state in arb_durable()) {
        let json = state.to_json().unwrap();
        let loaded = DurableState::from_json(&json);
        prop_assert_eq!(loaded, state);
    }

    /// Arbitrary text never panics the loader.
    #[test]
    fn loader_never_panics(raw in ".{0,200}") {
        let _ = DurableState::from_json(&raw);
    }

    /// Unknown keys are ignored and a malformed key only loses itself.
    #[test]
    fn unknown_and_malformed_keys_are_local(care in any::<u32>(), junk in "[a-z]{1,12}") {
        let raw = format!(
            r#"{{"carePoints":{},"zz_{}":true,"mode":42,"voiceEnabled":"yes"}}"#,
            care, junk
        );
        let state = DurableState::from_json(&raw);
        prop_assert_eq!(state.care_points, care);
        prop_assert_eq!(state.mode, Mode::Chill);
        prop_assert!(state.voice_enabled);
    }
}
