//! Host runtime
//!
//! Owns the [`Creature`] and carries out the effects it asks for: saving
//! durable state, showing notifications, fetching weather and publishing to
//! the relay. Inputs (clock, stdin, sensor trace, relay, weather results) are
//! multiplexed in one loop so the engine is only ever touched from one task.

use crate::notifier::LogNotifier;
use andro_core::{AndroConfig, Capability, CommandSource, Millis, Notifier, Permission};
use andro_expression::{Creature, CreatureConfig, DeviceCapabilities, Effect};
use andro_gateway::RelayClient;
use andro_limbic::RawSample;
use andro_memory::{open_store, StateStore};
use andro_perception::{spawn_replay, OpenMeteoProvider, SensorTrace, WeatherProvider};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

pub struct RunOptions {
    pub trace: Option<PathBuf>,
    pub loop_trace: bool,
    pub print_frames: bool,
    pub duration: Option<Duration>,
    pub read_stdin: bool,
}

/// What the loop should do after a line of input.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Quit,
}

pub fn now_ms() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

pub struct Runtime {
    creature: Creature,
    store: Box<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    weather: Option<Arc<dyn WeatherProvider>>,
    relay: Option<RelayClient>,
    weather_tx: mpsc::Sender<Result<u16, String>>,
    weather_rx: mpsc::Receiver<Result<u16, String>>,
    last_frame_at: Option<Millis>,
}

impl Runtime {
    pub fn new(
        creature: Creature,
        store: Box<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        weather: Option<Arc<dyn WeatherProvider>>,
    ) -> Self {
        let (weather_tx, weather_rx) = mpsc::channel(4);
        Self {
            creature,
            store,
            notifier,
            weather,
            relay: None,
            weather_tx,
            weather_rx,
            last_frame_at: None,
        }
    }

    /// Open the store, load durable state and build the creature the way
    /// `config` describes this host.
    pub async fn from_config(config: &AndroConfig) -> Result<Self> {
        let store = open_store(&config.storage).await?;
        let durable = store
            .load()
            .await
            .context("Failed to load durable state")?;

        let weather: Option<Arc<dyn WeatherProvider>> =
            match OpenMeteoProvider::from_config(&config.weather) {
                Ok(provider) => Some(Arc::new(provider)),
                Err(e) => {
                    tracing::warn!("Weather disabled: {}", e);
                    None
                }
            };

        let caps = DeviceCapabilities {
            microphone: Capability::unavailable("no microphone on this host"),
            notifications: if config.notifications.enabled {
                Permission::Granted
            } else {
                Permission::Denied
            },
            location: if weather.is_some() {
                Permission::Granted
            } else {
                Permission::Denied
            },
        };

        let creature = Creature::new(
            CreatureConfig::from_engine(&config.engine),
            durable,
            caps,
            now_ms(),
        );
        Ok(Self::new(creature, store, Arc::new(LogNotifier), weather))
    }

    pub fn creature(&self) -> &Creature {
        &self.creature
    }

    /// Join the relay when one is configured.
    fn connect_relay(
        &mut self,
        config: &AndroConfig,
    ) -> Result<Option<mpsc::Receiver<andro_core::RelayMessage>>> {
        let (Some(url), Some(token)) = (&config.relay.url, &config.relay.token) else {
            tracing::debug!("No relay configured");
            return Ok(None);
        };
        let (client, inbox) = RelayClient::connect(url, &config.relay.creature_id, token)?;
        self.relay = Some(client);
        Ok(Some(inbox))
    }

    pub async fn run(mut self, config: &AndroConfig, options: RunOptions) -> Result<()> {
        let mut relay_rx = self.connect_relay(config)?;

        let mut sensor_rx = match &options.trace {
            Some(path) => {
                let trace = SensorTrace::load(path).await?;
                tracing::info!("Replaying {} samples from {}", trace.len(), path.display());
                let (tx, rx) = mpsc::channel::<RawSample>(64);
                spawn_replay(trace, tx, options.loop_trace);
                Some(rx)
            }
            None => None,
        };

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = options.read_stdin;
        let deadline = options.duration.map(|d| Instant::now() + d);

        let frame_ms = config.engine.frame_interval_ms.max(1);
        let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.creature.advance_to(now_ms());
                    if options.print_frames {
                        self.print_frame();
                    }
                }
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        if self.handle_line(&line, now_ms()) == LineOutcome::Quit {
                            break;
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        tracing::warn!("Stdin closed: {}", e);
                        stdin_open = false;
                    }
                },
                Some(result) = self.weather_rx.recv() => {
                    self.creature.apply_weather(result, now_ms());
                }
                Some(sample) = recv_opt(&mut sensor_rx) => {
                    self.creature.ingest(&sample, now_ms());
                }
                Some(message) = recv_opt(&mut relay_rx) => {
                    if let Err(e) = self.creature.handle_relay(message, now_ms()) {
                        tracing::warn!("Bad relay command: {}", e);
                    }
                }
                _ = sleep_until_opt(deadline) => {
                    tracing::info!("Run duration reached");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted");
                    break;
                }
            }
            self.dispatch_effects().await;
        }

        self.dispatch_effects().await;
        if let Err(e) = self.store.save(self.creature.durable()).await {
            tracing::warn!("Failed to save state on shutdown: {}", e);
        }
        tracing::info!("Andro is resting. Bye!");
        Ok(())
    }

    /// One line typed at the terminal. A few words are host controls; the
    /// rest go to the creature as a typed command.
    pub fn handle_line(&mut self, line: &str, now: Millis) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Continue;
        }
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        match (word.to_lowercase().as_str(), rest.trim()) {
            ("quit" | "exit", _) => return LineOutcome::Quit,
            ("status", _) => match serde_json::to_string(&self.creature.status()) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!("Failed to encode status: {}", e),
            },
            ("note", note) if !note.is_empty() => self.creature.add_note(note),
            ("touch", _) => self.creature.touch_start(now),
            ("shake", _) => self.creature.shake(now),
            ("say", _) => self.creature.speak(now),
            ("weather", toggle @ ("on" | "off")) => {
                self.creature.set_weather_enabled(toggle == "on")
            }
            ("notifications", toggle @ ("on" | "off")) => {
                self.creature.set_notifications_enabled(toggle == "on")
            }
            ("launch", action) if !action.is_empty() => self.creature.handle_launch(action, now),
            _ => {
                if self
                    .creature
                    .handle_command(line, CommandSource::Typed, now)
                    .is_none()
                {
                    println!("(Andro tilts its head)");
                }
            }
        }
        LineOutcome::Continue
    }

    /// Carry out everything the creature asked for since the last call.
    pub async fn dispatch_effects(&mut self) {
        let mut persist = false;
        for effect in self.creature.drain_effects() {
            match effect {
                Effect::Notify { title, body, tag } => {
                    if let Err(e) = self.notifier.notify(&title, &body, &tag).await {
                        tracing::warn!("Notification failed: {}", e);
                    }
                }
                Effect::Haptic { duration_ms } => tracing::debug!("Haptic pulse {}ms", duration_ms),
                Effect::Persist => persist = true,
                Effect::FetchWeather => self.fetch_weather(),
                Effect::StartListening => tracing::debug!("Listener requested, no microphone"),
                Effect::StopListening => tracing::debug!("Listener stopped"),
                Effect::Publish(status) => {
                    if let Some(relay) = &self.relay {
                        relay.publish(status);
                    }
                }
            }
        }
        // Several changes in one turn collapse into a single write
        if persist {
            if let Err(e) = self.store.save(self.creature.durable()).await {
                tracing::warn!("Failed to save state: {}", e);
            }
        }
    }

    fn fetch_weather(&mut self) {
        let Some(provider) = self.weather.clone() else {
            self.creature
                .apply_weather(Err("no weather provider".to_string()), now_ms());
            return;
        };
        let tx = self.weather_tx.clone();
        tokio::spawn(async move {
            let result = provider.current_code().await.map_err(|e| e.to_string());
            let _ = tx.send(result).await;
        });
    }

    fn print_frame(&mut self) {
        let frame = self.creature.frame();
        if self.last_frame_at == Some(frame.at) {
            return;
        }
        self.last_frame_at = Some(frame.at);
        match serde_json::to_string(frame) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!("Failed to encode frame: {}", e),
        }
    }
}

async fn recv_opt<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use andro_core::{DurableState, Mode};
    use andro_memory::MemoryStore;
    use andro_perception::WeatherError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, title: &str, _body: &str, tag: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(format!("{}:{}", tag, title));
            Ok(())
        }
    }

    struct FixedWeather(u16);

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn current_code(&self) -> Result<u16, WeatherError> {
            Ok(self.0)
        }
    }

    const T0: Millis = 1_700_000_000_000;

    fn runtime(
        caps: DeviceCapabilities,
        weather: Option<Arc<dyn WeatherProvider>>,
    ) -> (Runtime, Arc<RecordingNotifier>) {
        let config = CreatureConfig {
            seed: 7,
            ..CreatureConfig::default()
        };
        let durable = DurableState {
            notifications_enabled: true,
            weather_enabled: true,
            ..DurableState::default()
        };
        let creature = Creature::new(config, durable, caps, T0);
        let notifier = Arc::new(RecordingNotifier::default());
        let rt = Runtime::new(
            creature,
            Box::new(MemoryStore::new()),
            notifier.clone(),
            weather,
        );
        (rt, notifier)
    }

    #[tokio::test]
    async fn test_typed_command_is_saved() {
        let (mut rt, _) = runtime(DeviceCapabilities::default(), None);
        assert_eq!(rt.handle_line("focus", T0), LineOutcome::Continue);
        assert_eq!(rt.creature().mode(), Mode::Focus);

        rt.dispatch_effects().await;
        let saved = rt.store.load().await.unwrap();
        assert_eq!(saved.mode, Mode::Focus);
    }

    #[tokio::test]
    async fn test_host_controls() {
        let (mut rt, _) = runtime(DeviceCapabilities::default(), None);
        assert_eq!(rt.handle_line("   ", T0), LineOutcome::Continue);
        assert_eq!(rt.handle_line("note water the plant", T0), LineOutcome::Continue);
        assert!(rt
            .creature()
            .durable()
            .notes
            .iter()
            .any(|n| n.contains("water the plant")));
        assert_eq!(rt.handle_line("Quit", T0), LineOutcome::Quit);
        assert_eq!(rt.handle_line("exit now", T0), LineOutcome::Quit);
    }

    #[tokio::test]
    async fn test_notifications_reach_notifier() {
        let caps = DeviceCapabilities {
            notifications: Permission::Granted,
            ..DeviceCapabilities::default()
        };
        let (mut rt, notifier) = runtime(caps, None);
        // First routine pass is due at startup
        rt.creature.advance_to(T0);
        rt.dispatch_effects().await;
        assert!(!notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_weather_result_comes_back_through_channel() {
        let caps = DeviceCapabilities {
            location: Permission::Granted,
            ..DeviceCapabilities::default()
        };
        let (mut rt, _) = runtime(caps, Some(Arc::new(FixedWeather(61))));
        rt.creature.advance_to(T0);
        assert!(rt.creature().weather_in_flight());
        rt.dispatch_effects().await;

        let result = tokio::time::timeout(Duration::from_secs(5), rt.weather_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Ok(61));
        rt.creature.apply_weather(result, T0 + 10);
        assert!(!rt.creature().weather_in_flight());
    }
}
