//! Sensor trace replay
//!
//! A trace is a JSON-lines file, one raw sample per line, each carrying the
//! offset (`at`, ms from the start of the recording) it was captured at:
//!
//! ```text
//! {"at": 0, "loudness": 8.0}
//! {"at": 2500, "acceleration": [0.0, 0.0, 21.0]}
//! ```
//!
//! Blank lines and `#` comments are skipped. Malformed lines are dropped with a
//! warning so one bad sample never stops a replay.

use andro_core::Millis;
use andro_limbic::RawSample;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Offset from the start of the recording, ms
    pub at: Millis,
    #[serde(flatten)]
    pub sample: RawSample,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorTrace {
    entries: Vec<TraceEntry>,
}

impl SensorTrace {
    pub fn parse(raw: &str) -> Self {
        let mut entries: Vec<TraceEntry> = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            })
            .filter_map(|(n, line)| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping trace line {}: {}", n + 1, e);
                    None
                }
            })
            .collect();
        // Stable, so samples sharing an offset keep file order
        entries.sort_by_key(|e| e.at);
        Self { entries }
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read sensor trace {}", path.as_ref().display()))?;
        let trace = Self::parse(&raw);
        tracing::info!(
            "Loaded sensor trace with {} samples over {}s",
            trace.len(),
            trace.duration_ms() / 1000
        );
        Ok(trace)
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the last sample.
    pub fn duration_ms(&self) -> Millis {
        self.entries.last().map(|e| e.at).unwrap_or(0)
    }
}

/// Send each sample at its recorded offset from now. With `looped`, start over
/// after the last sample. Stops when the receiver is dropped.
pub fn spawn_replay(
    trace: SensorTrace,
    tx: mpsc::Sender<RawSample>,
    looped: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if trace.is_empty() {
            tracing::warn!("Sensor trace is empty, nothing to replay");
            return;
        }
        loop {
            let start = tokio::time::Instant::now();
            for entry in trace.entries() {
                let offset = Duration::from_millis(entry.at.max(0) as u64);
                tokio::time::sleep_until(start + offset).await;
                if tx.send(entry.sample.clone()).await.is_err() {
                    tracing::debug!("Replay receiver gone, stopping");
                    return;
                }
            }
            if !looped {
                tracing::info!("Sensor trace finished");
                return;
            }
            // One cadence gap before restarting, so the last and first samples don't collide
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
}
