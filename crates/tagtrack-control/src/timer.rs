//! Deadline-ordered session timers.
//!
//! All session timers live in one queue owned by the session, so a timer
//! firing is just another event handled on the session's thread. Re-arming
//! a timer supersedes its previous deadline; superseded and cancelled entries
//! are discarded lazily when they reach the front of the queue.

use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// Identifies a session timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Waiting for the outstanding command's acknowledgment.
    AckTimeout,
    /// Waiting for the next controller heartbeat.
    ControllerHeartbeat,
    /// Waiting for the next detector heartbeat on a channel.
    ChannelHeartbeat(u32),
    /// Waiting for the next confirmed pulse on a channel.
    ChannelStale(u32),
}

#[derive(Debug)]
struct Entry {
    deadline: Instant,
    generation: u64,
    key: TimerKey,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.generation == other.generation
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering for min-heap (earliest deadline first, then arm order)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

/// A queue of one-shot timers keyed by [`TimerKey`].
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Entry>,
    armed: HashMap<TimerKey, u64>,
    next_generation: u64,
}

impl TimerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire `window` after `now`, replacing any earlier arming.
    pub fn arm(&mut self, key: TimerKey, now: Instant, window: Duration) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.armed.insert(key, generation);
        self.heap.push(Entry {
            deadline: now + window,
            generation,
            key,
        });
    }

    /// Cancel `key`. Returns whether it was armed.
    pub fn cancel(&mut self, key: TimerKey) -> bool {
        self.armed.remove(&key).is_some()
    }

    /// Cancel every timer.
    pub fn cancel_all(&mut self) {
        self.armed.clear();
        self.heap.clear();
    }

    /// Whether `key` is currently armed.
    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.armed.contains_key(&key)
    }

    /// Number of armed timers.
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Earliest deadline among armed timers.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_dead();
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// Remove and return the earliest timer due at or before `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Option<TimerKey> {
        self.discard_dead();
        if self.heap.peek()?.deadline > now {
            return None;
        }
        let entry = self.heap.pop()?;
        self.armed.remove(&entry.key);
        Some(entry.key)
    }

    fn discard_dead(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.armed.get(&entry.key) == Some(&entry.generation) {
                break;
            }
            self.heap.pop();
        }
    }
}
