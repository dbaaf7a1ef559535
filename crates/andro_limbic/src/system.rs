use crate::drives::{self, DriveModel, WakeEvent};
use crate::resolver::{self, ResolverInput, SPENT_CURIOSITY};
use crate::sensors::{RawSample, SensorNormalizer};
use crate::transient::TransientTracker;
use andro_core::{
    DriveState, Emotion, Environment, Millis, SystemMode, TransientWindows, WindowKind,
};

pub const FEED_ENERGY: f32 = 8.0;
pub const FEED_SOCIAL_RELIEF: f32 = 15.0;
pub const HAPPY_MS: Millis = 1_600;

/// What one cognition tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CognitionReport {
    pub emotion: Emotion,
    pub system_mode: SystemMode,
    /// Wakes caused by the snapshot (shock, loud sound)
    pub woke: Vec<WakeEvent>,
    /// The creature went to sleep during this tick
    pub fell_asleep: bool,
}

/// The creature's fast loop.
///
/// Owns drives, the environment snapshot, the transient window set and the
/// tracker's hysteresis. Everything here is session-scoped: a fresh instance
/// starts from defaults. The instance is plain data driven by explicit
/// timestamps, so several can coexist and a test can run one on a virtual
/// clock.
#[derive(Debug, Clone)]
pub struct LimbicSystem {
    drives: DriveState,
    env: Environment,
    windows: TransientWindows,
    tracker: TransientTracker,
    normalizer: SensorNormalizer,
    model: DriveModel,
    emotion: Emotion,
    system_mode: SystemMode,
}

impl LimbicSystem {
    pub fn new(inactivity_sleep_ms: Millis, now: Millis) -> Self {
        Self {
            drives: DriveState::new(now),
            env: Environment::default(),
            windows: TransientWindows::default(),
            tracker: TransientTracker::new(now, inactivity_sleep_ms),
            normalizer: SensorNormalizer::new(),
            model: DriveModel::new(inactivity_sleep_ms),
            emotion: Emotion::Neutral,
            system_mode: SystemMode::Active,
        }
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Normalize a raw sample into the snapshot.
    pub fn ingest(&mut self, sample: &RawSample) -> &Environment {
        self.env = self.normalizer.normalize(sample);
        tracing::trace!(
            "Snapshot: motion={:.2} loud={:.1} presence={}",
            self.env.motion,
            self.env.loudness,
            self.env.presence
        );
        &self.env
    }

    /// Replace the snapshot wholesale.
    pub fn set_environment(&mut self, env: Environment) {
        self.env = env;
    }

    pub fn set_power_level(&mut self, level: Option<f32>) {
        self.env.power_level = level.filter(|l| l.is_finite()).map(|l| l.clamp(0.0, 1.0));
    }

    pub fn set_online(&mut self, online: bool) {
        self.env.online = online;
    }

    // ------------------------------------------------------------------
    // Cognition
    // ------------------------------------------------------------------

    /// Tracker, drive decay, then resolution.
    pub fn cognition_tick(&mut self, now: Millis) -> CognitionReport {
        let was_sleeping = self.drives.sleeping;

        let woke = self
            .tracker
            .observe(&self.env, &mut self.drives, &mut self.windows, now);
        self.system_mode = self.model.decay(&mut self.drives, now);

        if self.env.is_critical_power() && !self.drives.sleeping {
            tracing::warn!("Battery critical, shutting down into sleep");
            self.drives.sleeping = true;
            self.system_mode = SystemMode::Sleep;
        }

        let emotion = self.resolve(now);
        let fell_asleep = self.drives.sleeping && (!was_sleeping || !woke.is_empty());

        tracing::debug!(
            "Cognition: emotion={} mode={:?} energy={:.1} curiosity={:.1} social={:.1}",
            emotion,
            self.system_mode,
            self.drives.energy,
            self.drives.curiosity,
            self.drives.social_need
        );

        CognitionReport {
            emotion,
            system_mode: self.system_mode,
            woke,
            fell_asleep,
        }
    }

    /// Resolve the current emotion. Showing `wide` spends curiosity.
    pub fn resolve(&mut self, now: Millis) -> Emotion {
        let input = ResolverInput::capture(&self.drives, &self.env, &self.windows, now);
        let emotion = resolver::resolve(&input);
        if emotion == Emotion::Wide {
            self.drives.curiosity = SPENT_CURIOSITY;
        }
        if emotion != self.emotion {
            tracing::debug!("Emotion {} -> {}", self.emotion, emotion);
        }
        self.emotion = emotion;
        emotion
    }

    // ------------------------------------------------------------------
    // Discrete events
    // ------------------------------------------------------------------

    pub fn wake(&mut self, reason: &str, now: Millis) -> WakeEvent {
        self.tracker.reset_stillness(now);
        let event = drives::wake(&mut self.drives, &mut self.windows, reason, now);
        self.system_mode = SystemMode::Active;
        event
    }

    pub fn sleep(&mut self, now: Millis) {
        if !self.drives.sleeping {
            tracing::info!("Going to sleep");
        }
        self.drives.sleeping = true;
        self.system_mode = drives::system_mode(&self.drives, now);
    }

    /// Leave sleep without the wake choreography (explicit awake-mode switch).
    pub fn rouse(&mut self, now: Millis) {
        self.drives.sleeping = false;
        self.drives.last_interaction_at = now;
        self.tracker.reset_stillness(now);
        self.system_mode = SystemMode::Active;
    }

    pub fn feed(&mut self, now: Millis) {
        self.drives.energy += FEED_ENERGY;
        self.drives.social_need -= FEED_SOCIAL_RELIEF;
        self.drives.last_interaction_at = now;
        self.drives.normalize();
        self.windows.open(WindowKind::Happy, now, HAPPY_MS);
    }

    /// Brief happy flash, e.g. a giggle or good weather.
    pub fn cheer(&mut self, now: Millis) {
        self.windows.open(WindowKind::Happy, now, HAPPY_MS);
    }

    /// Any touch counts as an interaction.
    pub fn touched(&mut self, now: Millis) {
        self.drives.last_interaction_at = now;
    }

    pub fn voice_activity(&mut self, now: Millis) {
        self.tracker.voice_activity(&mut self.windows, now);
    }

    pub fn speech(&mut self, now: Millis) {
        self.tracker.speech(&mut self.windows, now);
    }

    pub fn shake(&mut self, now: Millis) -> WakeEvent {
        let event = self
            .tracker
            .shake(&mut self.drives, &mut self.windows, now);
        self.system_mode = SystemMode::Active;
        event
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn drives(&self) -> &DriveState {
        &self.drives
    }

    /// Mutable drives; callers must keep them in bounds via `normalize`.
    pub fn drives_mut(&mut self) -> &mut DriveState {
        &mut self.drives
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn windows(&self) -> &TransientWindows {
        &self.windows
    }

    pub fn tracker(&self) -> &TransientTracker {
        &self.tracker
    }

    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    pub fn is_sleeping(&self) -> bool {
        self.drives.sleeping
    }

    pub fn system_mode(&self) -> SystemMode {
        self.system_mode
    }
}
