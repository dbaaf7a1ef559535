use crate::animation::{
    Animator, Frame, BLINK_CLOSED_MS, SLEEP_INDICATOR_EVERY_MS, WAKE_BLINK_GAP_MS,
};
use crate::command::{self, Intent};
use crate::routine::{RoutineContext, RoutineEvent, RoutineScheduler};
use andro_core::config::EngineConfig;
use andro_core::{
    Action, ActionError, ActionPacket, Capability, CommandSource, CreatureStatus, DriveState,
    DurableState, Emotion, Environment, Millis, Mode, ModeProfile, Mood, Permission, RelayMessage,
    WindowKind,
};
use andro_limbic::drives::WakeEvent;
use andro_limbic::{HeartbeatConfig, LimbicSystem, RawSample, TaskQueue};
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;

/// Title used for the creature's own notifications.
pub const CREATURE_NAME: &str = "Emo Andro";

const SEEN_PACKET_IDS: usize = 32;
const WAKE_HAPTIC_MS: u32 = 35;
const SCRUB_SETTLE_MS: Millis = 200;
const SCRUB_GIGGLE_MOVES: u32 = 10;
const GIGGLE_MS: Millis = 650;
const LISTENER_RESTART_MS: Millis = 1_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Blink,
    WakeBlink,
    BlinkOpen,
    Retarget,
    SleepIndicator,
    ScrubSettle,
    GiggleEnd,
    RestartListener,
}

/// Side effects for the runtime to carry out. The engine never performs I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify {
        title: String,
        body: String,
        tag: String,
    },
    Haptic {
        duration_ms: u32,
    },
    /// Durable state changed; save [`Creature::durable`]
    Persist,
    FetchWeather,
    StartListening,
    StopListening,
    Publish(CreatureStatus),
}

/// Platform facilities handed to the engine.
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    pub microphone: Capability<()>,
    pub notifications: Permission,
    pub location: Permission,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            microphone: Capability::unavailable("no microphone provided"),
            notifications: Permission::Prompt,
            location: Permission::Prompt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatureConfig {
    pub heartbeat: HeartbeatConfig,
    pub inactivity_sleep_ms: Millis,
    pub seed: u64,
    /// Offset of the local wall clock used by daily routines
    pub utc_offset: FixedOffset,
    pub initial_mode: Option<Mode>,
    pub viewport_width: f32,
}

impl Default for CreatureConfig {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatConfig::default(),
            inactivity_sleep_ms: 20 * 60 * 1000,
            seed: 0,
            utc_offset: Utc.fix(),
            initial_mode: None,
            viewport_width: 800.0,
        }
    }
}

impl CreatureConfig {
    pub fn from_engine(cfg: &EngineConfig) -> Self {
        let utc_offset = cfg
            .utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60))
            .unwrap_or_else(|| *chrono::Local::now().offset());
        Self {
            heartbeat: HeartbeatConfig::from_engine(cfg),
            inactivity_sleep_ms: (cfg.inactivity_sleep_secs * 1000) as Millis,
            seed: cfg.seed.unwrap_or_else(rand::random),
            utc_offset,
            initial_mode: cfg.initial_mode,
            ..Self::default()
        }
    }
}

/// One animatronic creature.
///
/// Owns all session state (drives, windows, animation) plus the durable
/// record, and is advanced explicitly with [`Creature::advance_to`]. Periodic
/// cadences and one-shot tasks fire in timestamp order, ties broken by
/// cognition, routine, tasks, then frames, so a run is fully determined by its
/// seed and inputs.
pub struct Creature {
    config: CreatureConfig,
    limbic: LimbicSystem,
    animator: Animator,
    routine: RoutineScheduler,
    durable: DurableState,
    caps: DeviceCapabilities,
    rng: StdRng,
    tasks: TaskQueue<Task>,
    clock: Millis,
    next_frame_at: Millis,
    next_cognition_at: Millis,
    next_routine_at: Millis,
    frame: Frame,
    effects: Vec<Effect>,
    seen_packets: VecDeque<i64>,
    weather_in_flight: bool,
    listening: bool,
    foreground: bool,
    scrub_moves: u32,
}

impl Creature {
    pub fn new(
        config: CreatureConfig,
        durable: DurableState,
        caps: DeviceCapabilities,
        now: Millis,
    ) -> Self {
        let mut durable = durable;
        if let Some(mode) = config.initial_mode {
            durable.mode = mode;
        }

        let mut limbic = LimbicSystem::new(config.inactivity_sleep_ms, now);
        if durable.mode == Mode::Night {
            limbic.sleep(now);
        }
        let emotion = limbic.resolve(now);

        let mut animator = Animator::new(config.viewport_width);
        let profile = durable.mode.profile();
        let frame = animator.frame(
            now,
            emotion,
            limbic.environment(),
            &profile,
            limbic.is_sleeping(),
            false,
        );

        let mut creature = Self {
            rng: StdRng::seed_from_u64(config.seed),
            next_frame_at: now,
            next_cognition_at: now + config.heartbeat.cognition_ms,
            next_routine_at: now,
            config,
            limbic,
            animator,
            routine: RoutineScheduler::new(),
            durable,
            caps,
            tasks: TaskQueue::new(),
            clock: now,
            frame,
            effects: Vec::new(),
            seen_packets: VecDeque::with_capacity(SEEN_PACKET_IDS),
            weather_in_flight: false,
            listening: false,
            foreground: true,
            scrub_moves: 0,
        };

        creature.schedule_blink(now);
        creature.tasks.schedule(now, Task::Retarget);
        if creature.limbic.is_sleeping() {
            creature.tasks.schedule(now, Task::SleepIndicator);
        }
        creature.maybe_start_listening(now);

        tracing::info!(
            "Creature ready: mode={} mood={:?} care={}",
            creature.durable.mode,
            creature.durable.mood,
            creature.durable.care_points
        );
        creature
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// Run every cadence and task due up to and including `target`.
    pub fn advance_to(&mut self, target: Millis) {
        let hb = self.config.heartbeat;
        loop {
            let next_task = self.tasks.next_fire_at().unwrap_or(Millis::MAX);
            let next = self
                .next_cognition_at
                .min(self.next_routine_at)
                .min(next_task)
                .min(self.next_frame_at);
            if next > target {
                break;
            }
            self.clock = next;

            if self.next_cognition_at == next {
                self.cognition(next);
                self.next_cognition_at += hb.cognition_ms;
            } else if self.next_routine_at == next {
                self.run_routine(next);
                self.next_routine_at += hb.routine_ms;
            } else if next_task == next {
                if let Some((at, task)) = self.tasks.pop_due(next) {
                    self.run_task(task, at);
                }
            } else {
                self.render(next);
                self.next_frame_at += hb.frame_ms;
            }
        }
        self.clock = self.clock.max(target);
    }

    /// Earliest pending cadence or task.
    pub fn next_due(&self) -> Millis {
        self.next_cognition_at
            .min(self.next_routine_at)
            .min(self.next_frame_at)
            .min(self.tasks.next_fire_at().unwrap_or(Millis::MAX))
    }

    pub fn now(&self) -> Millis {
        self.clock
    }

    fn run_task(&mut self, task: Task, at: Millis) {
        match task {
            Task::Blink => {
                if !self.limbic.is_sleeping() {
                    self.animator.close_lids();
                    self.tasks.schedule(at + BLINK_CLOSED_MS, Task::BlinkOpen);
                }
                self.schedule_blink(at);
            }
            Task::WakeBlink => {
                if !self.limbic.is_sleeping() {
                    self.animator.close_lids();
                    self.tasks.schedule(at + BLINK_CLOSED_MS, Task::BlinkOpen);
                }
            }
            Task::BlinkOpen => self.animator.open_lids(),
            Task::Retarget => {
                let profile = self.profile();
                let sleeping = self.limbic.is_sleeping();
                self.animator.retarget(&profile, sleeping, &mut self.rng);
                let delay = Animator::retarget_delay(&profile, &mut self.rng);
                self.tasks.schedule(at + delay, Task::Retarget);
            }
            Task::SleepIndicator => {
                if self.limbic.is_sleeping() {
                    self.animator.spawn_sleep_indicator(at, &mut self.rng);
                    self.tasks
                        .schedule(at + SLEEP_INDICATOR_EVERY_MS, Task::SleepIndicator);
                }
            }
            Task::ScrubSettle => {
                if self.scrub_moves > SCRUB_GIGGLE_MOVES {
                    self.giggle(at);
                }
                self.scrub_moves = 0;
            }
            Task::GiggleEnd => {
                if !self.limbic.is_sleeping() {
                    self.durable.mood = self.awake_mood();
                    self.persist();
                }
            }
            Task::RestartListener => self.maybe_start_listening(at),
        }
    }

    fn schedule_blink(&mut self, from: Millis) {
        self.tasks.cancel(|t| *t == Task::Blink);
        if self.limbic.is_sleeping() {
            return;
        }
        let profile = self.profile();
        let delay = Animator::blink_delay(self.limbic.emotion(), &profile, &mut self.rng);
        self.tasks.schedule(from + delay, Task::Blink);
    }

    // ========================================================================
    // Cadences
    // ========================================================================

    fn cognition(&mut self, now: Millis) {
        let before = self.limbic.emotion();
        let report = self.limbic.cognition_tick(now);

        for event in &report.woke {
            self.wake_choreography(event, now);
        }

        if report.fell_asleep {
            if self.limbic.environment().is_critical_power() {
                self.durable.mood = Mood::LowPower;
                self.remember(now, "Sleep (low battery).");
            } else {
                self.durable.mood = Mood::Night;
                self.remember(now, "Sleep (inactivity).");
            }
            self.persist();
            self.enter_sleep(now);
        }

        if report.emotion != before {
            self.schedule_blink(now);
        }
        self.publish();
    }

    /// Evaluate the daily routines at `now`.
    pub fn run_routine(&mut self, now: Millis) {
        let Some(local) = self.local_time(now) else {
            return;
        };
        let ctx = RoutineContext {
            now_ms: now,
            local: local.naive_local(),
            mode: self.durable.mode,
            weather_ready: self.weather_ready(),
        };
        let events = self.routine.evaluate(&mut self.durable.routine, &ctx);
        if events.is_empty() {
            return;
        }
        // Ledger first, so a crash mid-dispatch never double-fires
        self.persist();

        for event in events {
            tracing::info!("Routine: {:?}", event);
            match event {
                RoutineEvent::MorningGreeting => {
                    if !self.limbic.is_sleeping() {
                        self.durable.mood = Mood::Happy;
                    }
                    self.notify(CREATURE_NAME, "Good morning.", "morning");
                    self.remember(now, "Morning routine.");
                }
                RoutineEvent::Bedtime => {
                    self.set_mode(Mode::Night, "routine", now);
                    self.notify(CREATURE_NAME, "Bedtime mode activated.", "bedtime");
                }
                RoutineEvent::Hydration => {
                    self.notify("Hydration", "Time to drink water.", "hydration");
                }
                RoutineEvent::FocusBreak => {
                    self.notify("Focus Break", "Take a short break.", "focus-break");
                }
                RoutineEvent::WeatherPoll => {
                    self.weather_in_flight = true;
                    self.effects.push(Effect::FetchWeather);
                }
            }
        }
    }

    fn render(&mut self, now: Millis) {
        let profile = self.profile();
        let sleeping = self.limbic.is_sleeping();
        let glow = self.limbic.windows().is_active(WindowKind::WakeGlow, now);
        self.frame = self.animator.frame(
            now,
            self.limbic.emotion(),
            self.limbic.environment(),
            &profile,
            sleeping,
            glow,
        );
        tracing::trace!("Frame {} look_x={:.2}", now, self.frame.look_x);
    }

    // ========================================================================
    // Core operations
    // ========================================================================

    pub fn wake(&mut self, reason: &str, now: Millis) {
        let event = self.limbic.wake(reason, now);
        self.wake_choreography(&event, now);
        self.refresh_emotion(now);
    }

    fn wake_choreography(&mut self, event: &WakeEvent, now: Millis) {
        if event.was_sleeping {
            self.durable.mood = Mood::Calm;
            self.remember(now, &format!("Woke up ({}).", event.reason));
            self.effects.push(Effect::Haptic {
                duration_ms: WAKE_HAPTIC_MS,
            });
            self.persist();
        }
        self.tasks.cancel(|t| {
            matches!(t, Task::Blink | Task::WakeBlink | Task::SleepIndicator)
        });
        self.tasks.schedule(now, Task::WakeBlink);
        self.tasks.schedule(now + WAKE_BLINK_GAP_MS, Task::WakeBlink);
        let profile = self.profile();
        self.animator.start_scan(now, &profile);
        self.schedule_blink(now + WAKE_BLINK_GAP_MS);
    }

    pub fn sleep(&mut self, reason: &str, now: Millis) {
        self.limbic.sleep(now);
        self.durable.mood = Mood::Night;
        self.remember(now, &format!("Sleep ({}).", reason));
        self.persist();
        self.enter_sleep(now);
    }

    fn enter_sleep(&mut self, now: Millis) {
        self.tasks.cancel(|t| {
            matches!(
                t,
                Task::Blink | Task::WakeBlink | Task::BlinkOpen | Task::SleepIndicator
            )
        });
        self.animator.open_lids();
        self.tasks.schedule(now, Task::SleepIndicator);
        self.refresh_emotion(now);
    }

    pub fn set_mode(&mut self, mode: Mode, reason: &str, now: Millis) {
        self.durable.mode = mode;
        if mode == Mode::Night {
            if !self.limbic.is_sleeping() {
                self.limbic.sleep(now);
                self.enter_sleep(now);
            }
            self.durable.mood = Mood::Night;
        } else if !self.limbic.is_sleeping() {
            self.durable.mood = self.awake_mood();
        }
        tracing::info!("Mode -> {} ({})", mode, reason);
        self.remember(now, &format!("Mode -> {} ({}).", mode, reason));
        self.persist();
        self.schedule_blink(now);
    }

    pub fn feed(&mut self, now: Millis) {
        self.limbic.feed(now);
        self.durable.care_points = self.durable.care_points.saturating_add(1);
        self.durable.mood = Mood::Happy;
        self.persist();
        self.refresh_emotion(now);
    }

    fn giggle(&mut self, now: Millis) {
        if self.limbic.is_sleeping() {
            return;
        }
        self.limbic.cheer(now);
        self.durable.mood = Mood::Happy;
        self.persist();
        self.tasks.cancel(|t| *t == Task::GiggleEnd);
        self.tasks.schedule(now + GIGGLE_MS, Task::GiggleEnd);
        self.refresh_emotion(now);
    }

    fn battery_status(&mut self, now: Millis) {
        let message = match self.durable.battery_level {
            Some(level) => format!("Battery {}%", (level * 100.0).round() as i32),
            None => "Battery unknown".to_string(),
        };
        tracing::info!("{}", message);
        self.remember(now, &message);
        self.limbic.speech(now);
        self.refresh_emotion(now);
    }

    /// Interpret free text and dispatch the matching action.
    pub fn handle_command(
        &mut self,
        text: &str,
        source: CommandSource,
        now: Millis,
    ) -> Option<Intent> {
        let cmd = command::normalize(text);
        if cmd.is_empty() {
            return None;
        }
        self.remember(now, &format!("Command ({}): {}", source, cmd));
        self.persist();

        let intent = command::interpret(&cmd);
        match intent {
            Some(Intent::Wake) => self.wake("command", now),
            Some(Intent::Sleep) => self.sleep("command", now),
            Some(Intent::SetMode(mode)) => {
                if mode != Mode::Night && self.limbic.is_sleeping() {
                    self.limbic.rouse(now);
                    self.tasks.cancel(|t| *t == Task::SleepIndicator);
                }
                self.set_mode(mode, "command", now);
            }
            Some(Intent::BatteryStatus) => self.battery_status(now),
            Some(Intent::Feed) => self.feed(now),
            Some(Intent::Mute) => self.mute(now),
            None => tracing::debug!("No command matched '{}'", cmd),
        }
        intent
    }

    pub fn handle_action(&mut self, action: Action, source: CommandSource, now: Millis) {
        tracing::debug!("Action from {}: {:?}", source, action);
        match action {
            Action::Wake => self.wake(source.as_str(), now),
            Action::Sleep => self.sleep(source.as_str(), now),
            Action::SetMode(mode) => self.set_mode(mode, source.as_str(), now),
            Action::Feed => {
                self.feed(now);
                self.giggle(now);
            }
            Action::VoiceToggle { enabled } => self.set_voice_enabled(enabled, now),
            Action::Mute => self.mute(now),
            Action::Command { text } => {
                self.handle_command(&text, source, now);
            }
            Action::EyePosition { x } => self.animator.pin_look(x, now),
        }
    }

    /// One packet from the cross-instance channel. Already-seen ids are ignored.
    pub fn handle_packet(&mut self, packet: &ActionPacket, now: Millis) -> Result<(), ActionError> {
        if self.seen_packets.contains(&packet.id) {
            tracing::debug!("Ignoring duplicate action packet {}", packet.id);
            return Ok(());
        }
        if self.seen_packets.len() == SEEN_PACKET_IDS {
            self.seen_packets.pop_front();
        }
        self.seen_packets.push_back(packet.id);

        let action = Action::from_packet(packet)?;
        self.handle_action(action, CommandSource::Controls, now);
        Ok(())
    }

    /// Notification launch action (`?action=...`).
    pub fn handle_launch(&mut self, action: &str, now: Millis) {
        match Action::from_launch(action) {
            Some(action) => self.handle_action(action, CommandSource::Controls, now),
            None => tracing::warn!("Unknown launch action '{}'", action),
        }
    }

    /// A message routed to this creature by the relay.
    pub fn handle_relay(&mut self, message: RelayMessage, now: Millis) -> Result<(), ActionError> {
        match message {
            RelayMessage::Command { action, payload } => {
                let action = Action::decode(&action, &payload)?;
                self.handle_action(action, CommandSource::Remote, now);
            }
            RelayMessage::RequestState => self.publish(),
            RelayMessage::Ack { ok: false, error, .. } => {
                tracing::warn!("Relay rejected a message: {}", error.unwrap_or_default());
            }
            other => tracing::debug!("Ignoring relay message {:?}", other),
        }
        Ok(())
    }

    // ========================================================================
    // Sensors and gestures
    // ========================================================================

    pub fn ingest(&mut self, sample: &RawSample, now: Millis) {
        let level = sample.power_level;
        self.limbic.ingest(sample);
        if level.is_some() && level != self.durable.battery_level {
            self.set_battery_level(level, now);
        }
    }

    pub fn set_environment(&mut self, env: Environment) {
        self.limbic.set_environment(env);
    }

    pub fn set_online(&mut self, online: bool) {
        self.limbic.set_online(online);
    }

    pub fn set_battery_level(&mut self, level: Option<f32>, now: Millis) {
        self.limbic.set_power_level(level);
        self.durable.battery_level = self.limbic.environment().power_level;
        if self.limbic.environment().is_critical_power() {
            if !self.limbic.is_sleeping() {
                self.limbic.sleep(now);
                self.enter_sleep(now);
            }
            self.durable.mood = Mood::LowPower;
        }
        self.persist();
    }

    pub fn touch_start(&mut self, now: Millis) {
        self.wake("touch", now);
        self.maybe_start_listening(now);
    }

    pub fn touch_move(&mut self, now: Millis) {
        if self.limbic.is_sleeping() {
            self.wake("touch", now);
            return;
        }
        self.scrub_moves += 1;
        self.tasks.cancel(|t| *t == Task::ScrubSettle);
        self.tasks.schedule(now + SCRUB_SETTLE_MS, Task::ScrubSettle);
        self.limbic.touched(now);
    }

    pub fn shake(&mut self, now: Millis) {
        let event = self.limbic.shake(now);
        self.wake_choreography(&event, now);
        self.refresh_emotion(now);
    }

    /// The creature starts talking.
    pub fn speak(&mut self, now: Millis) {
        self.limbic.speech(now);
        self.refresh_emotion(now);
    }

    // ========================================================================
    // Voice
    // ========================================================================

    /// Speech detected, before any transcript is available.
    pub fn voice_activity(&mut self, now: Millis) {
        self.limbic.voice_activity(now);
        self.refresh_emotion(now);
    }

    /// A final transcript from the voice listener.
    pub fn voice_heard(&mut self, transcript: &str, now: Millis) -> Option<Intent> {
        self.limbic.voice_activity(now);
        let intent = self.handle_command(transcript, CommandSource::Voice, now);
        self.refresh_emotion(now);
        intent
    }

    pub fn set_voice_enabled(&mut self, enabled: bool, now: Millis) {
        self.durable.voice_enabled = enabled;
        self.remember(
            now,
            if enabled {
                "Voice enabled."
            } else {
                "Voice disabled."
            },
        );
        self.persist();
        if enabled {
            self.maybe_start_listening(now);
        } else {
            self.stop_listening();
        }
    }

    pub fn mute(&mut self, now: Millis) {
        self.durable.voice_enabled = false;
        self.remember(now, "Muted.");
        self.persist();
        self.stop_listening();
    }

    /// The listener stopped by itself; restart shortly if still wanted.
    pub fn listener_ended(&mut self, now: Millis) {
        self.listening = false;
        self.tasks.cancel(|t| *t == Task::RestartListener);
        if self.durable.voice_enabled && self.foreground {
            self.tasks
                .schedule(now + LISTENER_RESTART_MS, Task::RestartListener);
        }
    }

    /// The microphone is gone for good this session.
    pub fn microphone_unavailable(&mut self, reason: &str) {
        self.caps.microphone.revoke(reason);
        self.listening = false;
        self.tasks.cancel(|t| *t == Task::RestartListener);
    }

    pub fn set_foreground(&mut self, visible: bool, now: Millis) {
        self.foreground = visible;
        if visible {
            self.limbic.touched(now);
            self.maybe_start_listening(now);
        } else {
            self.tasks.cancel(|t| *t == Task::RestartListener);
            self.stop_listening();
        }
    }

    fn maybe_start_listening(&mut self, now: Millis) {
        if self.listening
            || !self.foreground
            || !self.durable.voice_enabled
            || !self.caps.microphone.is_available()
        {
            return;
        }
        self.listening = true;
        self.effects.push(Effect::StartListening);
        self.remember(now, "Voice listener active.");
        self.persist();
    }

    fn stop_listening(&mut self) {
        if self.listening {
            self.listening = false;
            self.effects.push(Effect::StopListening);
        }
    }

    // ========================================================================
    // Weather and toggles
    // ========================================================================

    fn weather_ready(&self) -> bool {
        self.durable.weather_enabled
            && self.limbic.environment().online
            && self.caps.location == Permission::Granted
            && !self.weather_in_flight
    }

    /// Apply the outcome of a weather lookup started by [`Effect::FetchWeather`].
    pub fn apply_weather(&mut self, result: Result<u16, String>, now: Millis) {
        self.weather_in_flight = false;
        if !self.durable.weather_enabled {
            tracing::debug!("Weather disabled while in flight, discarding result");
            return;
        }
        let code = match result {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!("Weather lookup failed, retrying next routine: {}", e);
                return;
            }
        };

        self.durable.routine.last_weather_at = now;
        self.durable.last_weather_code = Some(code);
        if !self.limbic.is_sleeping() {
            self.durable.mood = if code <= 2 {
                self.limbic.cheer(now);
                Mood::Happy
            } else if code >= 61 {
                Mood::Cozy
            } else {
                self.awake_mood()
            };
        }
        tracing::info!("Weather code {} -> mood {:?}", code, self.durable.mood);
        self.persist();
        self.refresh_emotion(now);
    }

    pub fn set_weather_enabled(&mut self, enabled: bool) {
        self.durable.weather_enabled = enabled;
        self.persist();
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.durable.notifications_enabled = enabled;
        self.persist();
    }

    pub fn add_note(&mut self, note: &str) {
        self.durable.add_note(note);
        self.persist();
    }

    /// Adopt durable state written by another instance.
    pub fn replace_durable(&mut self, durable: DurableState, now: Millis) {
        self.durable = durable;
        if self.durable.mode == Mode::Night && !self.limbic.is_sleeping() {
            self.limbic.sleep(now);
            self.enter_sleep(now);
        }
        self.refresh_emotion(now);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn refresh_emotion(&mut self, now: Millis) {
        let before = self.limbic.emotion();
        if self.limbic.resolve(now) != before {
            self.schedule_blink(now);
        }
    }

    fn awake_mood(&self) -> Mood {
        if self.durable.mode == Mode::Focus {
            Mood::Focus
        } else {
            Mood::Calm
        }
    }

    fn profile(&self) -> ModeProfile {
        let base = self.durable.mode.profile();
        if self.limbic.environment().is_low_power() {
            base.low_power()
        } else {
            base
        }
    }

    fn local_time(&self, now: Millis) -> Option<DateTime<FixedOffset>> {
        self.config.utc_offset.timestamp_millis_opt(now).single()
    }

    fn remember(&mut self, now: Millis, message: &str) {
        match self.local_time(now) {
            Some(at) => self.durable.remember(at, message),
            None => tracing::warn!("Timestamp {} out of range, not remembered", now),
        }
    }

    fn persist(&mut self) {
        if !self.effects.contains(&Effect::Persist) {
            self.effects.push(Effect::Persist);
        }
    }

    fn notify(&mut self, title: &str, body: &str, tag: &str) {
        if !self.durable.notifications_enabled || self.caps.notifications != Permission::Granted {
            tracing::debug!("Notification '{}' suppressed", tag);
            return;
        }
        self.effects.push(Effect::Notify {
            title: title.to_string(),
            body: body.to_string(),
            tag: tag.to_string(),
        });
    }

    fn publish(&mut self) {
        let status = self.status();
        self.effects.push(Effect::Publish(status));
    }

    /// Take every effect produced since the last call.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn status(&self) -> CreatureStatus {
        let drives = self.limbic.drives();
        CreatureStatus {
            emotion: self.limbic.emotion(),
            mode: self.durable.mode,
            mood: self.durable.mood,
            system_mode: self.limbic.system_mode(),
            sleeping: drives.sleeping,
            energy: drives.energy,
            curiosity: drives.curiosity,
            social_need: drives.social_need,
            care_points: self.durable.care_points,
            battery_level: self.durable.battery_level,
        }
    }

    pub fn emotion(&self) -> Emotion {
        self.limbic.emotion()
    }

    pub fn drives(&self) -> &DriveState {
        self.limbic.drives()
    }

    pub fn durable(&self) -> &DurableState {
        &self.durable
    }

    pub fn limbic(&self) -> &LimbicSystem {
        &self.limbic
    }

    /// Direct access to the fast loop, for hosts that feed it themselves.
    pub fn limbic_mut(&mut self) -> &mut LimbicSystem {
        &mut self.limbic
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn mode(&self) -> Mode {
        self.durable.mode
    }

    pub fn is_sleeping(&self) -> bool {
        self.limbic.is_sleeping()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn weather_in_flight(&self) -> bool {
        self.weather_in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creature() -> Creature {
        let config = CreatureConfig {
            seed: 7,
            ..Default::default()
        };
        Creature::new(config, DurableState::default(), DeviceCapabilities::default(), 0)
    }

    #[test]
    fn test_night_command_sleeps_in_one_dispatch() {
        let mut c = creature();
        let intent = c.handle_command("Night", CommandSource::Typed, 100);
        assert_eq!(intent, Some(Intent::SetMode(Mode::Night)));
        assert_eq!(c.mode(), Mode::Night);
        assert!(c.is_sleeping());
        assert_eq!(c.durable().mood, Mood::Night);
        assert_eq!(c.emotion(), Emotion::Sleepy);
        assert!(c
            .durable()
            .memory
            .iter()
            .any(|m| m.ends_with("Command (typed): night")));
        assert!(c.drain_effects().contains(&Effect::Persist));
    }

    #[test]
    fn test_chill_command_rouses() {
        let mut c = creature();
        c.sleep("test", 0);
        c.handle_command("chill out", CommandSource::Voice, 100);
        assert!(!c.is_sleeping());
        assert_eq!(c.durable().mood, Mood::Calm);
    }

    #[test]
    fn test_wake_from_sleep() {
        let mut c = creature();
        c.sleep("test", 0);
        c.drain_effects();
        c.wake("test", 1_000);

        assert!(!c.is_sleeping());
        assert_eq!(c.drives().curiosity, 20.0);
        assert_eq!(c.durable().mood, Mood::Calm);
        assert!(c.animator().is_scanning());
        let effects = c.drain_effects();
        assert!(effects.contains(&Effect::Haptic { duration_ms: 35 }));
    }

    #[test]
    fn test_wake_while_awake_has_no_haptic() {
        let mut c = creature();
        c.drain_effects();
        c.wake("test", 1_000);
        assert!(c.animator().is_scanning());
        assert!(!c
            .drain_effects()
            .iter()
            .any(|e| matches!(e, Effect::Haptic { .. })));
    }

    #[test]
    fn test_unmatched_command_is_remembered() {
        let mut c = creature();
        assert_eq!(c.handle_command("sing a song", CommandSource::Typed, 0), None);
        assert!(c.durable().last_memory().unwrap_or_default().contains("sing a song"));
        assert_eq!(c.handle_command("   ", CommandSource::Typed, 0), None);
    }

    #[test]
    fn test_battery_command_speaks() {
        let mut c = creature();
        c.set_battery_level(Some(0.42), 0);
        c.handle_command("battery?", CommandSource::Typed, 10);
        assert!(c.durable().memory.iter().any(|m| m.ends_with("Battery 42%")));
        assert_eq!(c.emotion(), Emotion::Speaking);
    }

    #[test]
    fn test_critical_battery() {
        let mut c = creature();
        c.set_battery_level(Some(0.05), 0);
        assert!(c.is_sleeping());
        assert_eq!(c.durable().mood, Mood::LowPower);
        assert_eq!(c.emotion(), Emotion::LowBattery);
    }
}
