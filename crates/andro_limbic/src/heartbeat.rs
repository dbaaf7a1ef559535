//! Heartbeat cadences and the one-shot task queue
//!
//! The engine never sleeps on wall-clock timers. Periodic work runs at fixed
//! cadences, one-shot work (blink close/open, retargets, sleep markers) sits in
//! a queue ordered by fire time and then by insertion order, so replaying the
//! same inputs against the same virtual clock gives the same run.

use andro_core::config::EngineConfig;
use andro_core::Millis;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// How often each periodic loop fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub frame_ms: Millis,
    pub cognition_ms: Millis,
    pub routine_ms: Millis,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            frame_ms: 16,
            cognition_ms: 2_000,
            routine_ms: 60_000,
        }
    }
}

impl HeartbeatConfig {
    pub fn from_engine(cfg: &EngineConfig) -> Self {
        Self {
            frame_ms: cfg.frame_interval_ms.max(1) as Millis,
            cognition_ms: cfg.cognition_interval_ms.max(1) as Millis,
            routine_ms: (cfg.routine_interval_secs.max(1) * 1000) as Millis,
        }
    }

    /// Coarser frames for tests and headless runs
    pub fn testing() -> Self {
        Self {
            frame_ms: 100,
            ..Self::default()
        }
    }
}

struct Entry<T> {
    fire_at: Millis,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.fire_at, self.seq).cmp(&(other.fire_at, other.seq))
    }
}

/// Min-queue of `(fire_at, seq, task)`.
pub struct TaskQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: Millis, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { fire_at, seq, task }));
    }

    /// Pop the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: Millis) -> Option<(Millis, T)> {
        match self.heap.peek() {
            Some(Reverse(entry)) if entry.fire_at <= now => {}
            _ => return None,
        }
        self.heap
            .pop()
            .map(|Reverse(entry)| (entry.fire_at, entry.task))
    }

    pub fn next_fire_at(&self) -> Option<Millis> {
        self.heap.peek().map(|Reverse(entry)| entry.fire_at)
    }

    /// Drop every pending task matching `pred`.
    pub fn cancel<F: Fn(&T) -> bool>(&mut self, pred: F) {
        let kept: Vec<_> = std::mem::take(&mut self.heap)
            .into_vec()
            .into_iter()
            .filter(|Reverse(entry)| !pred(&entry.task))
            .collect();
        self.heap = BinaryHeap::from(kept);
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
