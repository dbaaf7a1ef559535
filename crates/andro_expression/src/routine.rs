//! Routine scheduler
//!
//! Evaluated once a minute against the local wall clock. Each rule is guarded
//! by the durable routine ledger so a rule fires at most once per day (morning,
//! bedtime) or per interval (hydration, focus break, weather), whatever the
//! evaluation frequency or number of restarts.

use andro_core::{Millis, Mode, RoutineLedger};
use chrono::{NaiveDateTime, Timelike};

pub const MORNING_FIRST_HOUR: u32 = 6;
pub const MORNING_LAST_HOUR: u32 = 10;
pub const HYDRATION_EVERY_MS: Millis = 2 * 60 * 60 * 1000;
pub const FOCUS_BREAK_EVERY_MS: Millis = 45 * 60 * 1000;
pub const WEATHER_EVERY_MS: Millis = 2 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineEvent {
    MorningGreeting,
    Bedtime,
    Hydration,
    FocusBreak,
    WeatherPoll,
}

/// Inputs for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RoutineContext {
    pub now_ms: Millis,
    pub local: NaiveDateTime,
    pub mode: Mode,
    /// Weather enabled, online, location granted and no request in flight
    pub weather_ready: bool,
}

/// Calendar rules for the creature's day.
#[derive(Debug, Clone)]
pub struct RoutineScheduler {
    /// Local (hour, minute) from which bedtime mode kicks in
    pub bedtime: (u32, u32),
}

impl Default for RoutineScheduler {
    fn default() -> Self {
        Self { bedtime: (22, 30) }
    }
}

/// `YYYY-MM-DD` key for a local date.
pub fn day_key(local: &NaiveDateTime) -> String {
    local.format("%Y-%m-%d").to_string()
}

impl RoutineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide which rules fire and stamp the ledger for them. The weather stamp
    /// is left to the caller, which only records a successful lookup.
    pub fn evaluate(&self, ledger: &mut RoutineLedger, ctx: &RoutineContext) -> Vec<RoutineEvent> {
        let mut fired = Vec::new();
        let today = day_key(&ctx.local);
        let hour = ctx.local.hour();
        let mut mode = ctx.mode;

        if (MORNING_FIRST_HOUR..=MORNING_LAST_HOUR).contains(&hour)
            && ledger.last_morning_day != today
        {
            ledger.last_morning_day = today.clone();
            fired.push(RoutineEvent::MorningGreeting);
        }

        if (hour, ctx.local.minute()) >= self.bedtime && ledger.last_bedtime_day != today {
            ledger.last_bedtime_day = today;
            mode = Mode::Night;
            fired.push(RoutineEvent::Bedtime);
        }

        if ctx.now_ms - ledger.last_hydration_at > HYDRATION_EVERY_MS {
            ledger.last_hydration_at = ctx.now_ms;
            fired.push(RoutineEvent::Hydration);
        }

        if mode == Mode::Focus && ctx.now_ms - ledger.last_break_at > FOCUS_BREAK_EVERY_MS {
            ledger.last_break_at = ctx.now_ms;
            fired.push(RoutineEvent::FocusBreak);
        }

        if ctx.weather_ready && ctx.now_ms - ledger.last_weather_at > WEATHER_EVERY_MS {
            fired.push(RoutineEvent::WeatherPoll);
        }

        if !fired.is_empty() {
            tracing::debug!("Routine rules fired: {:?}", fired);
        }
        fired
    }
}
