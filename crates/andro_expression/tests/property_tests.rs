//! Property-based tests for andro_expression.
//!
//! A creature run is a pure function of its seed and inputs, routine rules
//! fire at most once per ledger stamp, and commands ignore case and padding.

use andro_core::{DurableState, Mode, RoutineLedger};
use andro_expression::command::{interpret, normalize};
use andro_expression::{
    Creature, CreatureConfig, DeviceCapabilities, RoutineContext, RoutineEvent, RoutineScheduler,
};
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Clone)]
enum Input {
    Advance(i64),
    Touch,
    Scrub,
    Shake,
    Command(&'static str),
}

fn arb_input() -> impl Strategy<Value = Input> {
    prop_oneof![
        (1i64..5_000).prop_map(Input::Advance),
        Just(Input::Touch),
        Just(Input::Scrub),
        Just(Input::Shake),
        prop::sample::select(vec!["wake", "sleep", "focus", "chill", "night", "feed", "battery"])
            .prop_map(Input::Command),
    ]
}

fn arb_mode() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Chill), Just(Mode::Focus), Just(Mode::Night)]
}

fn arb_context() -> impl Strategy<Value = RoutineContext> {
    (0i64..3650, 0u32..24, 0u32..60, arb_mode(), any::<bool>(), 0i64..1_000_000_000).prop_map(
        |(days, hour, minute, mode, weather_ready, ms)| {
            let local = NaiveDate::from_ymd_opt(2024, 1, 1)
                .map(|d| d + Duration::days(days))
                .and_then(|d| d.and_hms_opt(hour, minute, 0))
                .unwrap();
            RoutineContext {
                now_ms: 1_700_000_000_000 + ms,
                local,
                mode,
                weather_ready,
            }
        },
    )
}

fn arb_ledger() -> impl Strategy<Value = RoutineLedger> {
    (0i64..1_700_000_000_000, 0i64..1_700_000_000_000, 0i64..1_700_000_000_000).prop_map(
        |(hydration, brk, weather)| RoutineLedger {
            last_hydration_at: hydration,
            last_break_at: brk,
            last_weather_at: weather,
            ..Default::default()
        },
    )
}

fn run(seed: u64, inputs: &[Input]) -> Creature {
    let config = CreatureConfig {
        seed,
        ..Default::default()
    };
    let mut c = Creature::new(config, DurableState::default(), DeviceCapabilities::default(), 0);
    let mut now = 0;
    for input in inputs {
        match input {
            Input::Advance(dt) => {
                now += dt;
                c.advance_to(now);
            }
            Input::Touch => c.touch_start(now),
            Input::Scrub => c.touch_move(now),
            Input::Shake => c.shake(now),
            Input::Command(text) => {
                c.handle_command(text, andro_core::CommandSource::Typed, now);
            }
        }
    }
    c
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn same_seed_same_run(
        seed in any::<u64>(),
        inputs in proptest::collection::vec(arb_input(), 0..40),
    ) {
        let a = run(seed, &inputs);
        let b = run(seed, &inputs);
        prop_assert_eq!(a.frame(), b.frame());
        prop_assert_eq!(a.status(), b.status());
        prop_assert_eq!(a.durable(), b.durable());
    }

    #[test]
    fn routine_rules_fire_once_per_stamp(
        ctx in arb_context(),
        ledger in arb_ledger(),
    ) {
        let scheduler = RoutineScheduler::new();
        let mut ledger = ledger;
        let first = scheduler.evaluate(&mut ledger, &ctx);

        // Bedtime switches the creature to night before the next evaluation
        let mut again = ctx;
        if first.contains(&RoutineEvent::Bedtime) {
            again.mode = Mode::Night;
        }
        let second = scheduler.evaluate(&mut ledger, &again);
        for event in second {
            prop_assert_eq!(event, RoutineEvent::WeatherPoll);
        }
    }

    #[test]
    fn commands_ignore_case_and_padding(text in "[a-zA-Z ]{0,30}") {
        let padded = format!("  {}\t", text.to_ascii_uppercase());
        prop_assert_eq!(interpret(&normalize(&text)), interpret(&normalize(&padded)));
    }
}
