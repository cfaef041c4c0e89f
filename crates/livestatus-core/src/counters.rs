//! Engine statistics shown in the `status` table.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use crate::util::Average;

const COUNTER_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Connections,
    Requests,
    Commands,
    Overflows,
    LogMessages,
    ServiceChecks,
    HostChecks,
    Forks,
}

impl Counter {
    pub const ALL: [Counter; COUNTER_COUNT] = [
        Counter::Connections,
        Counter::Requests,
        Counter::Commands,
        Counter::Overflows,
        Counter::LogMessages,
        Counter::ServiceChecks,
        Counter::HostChecks,
        Counter::Forks,
    ];

    /// Column stem in the `status` table (`<name>` and `<name>_rate`).
    pub fn column_name(self) -> &'static str {
        match self {
            Counter::Connections => "connections",
            Counter::Requests => "requests",
            Counter::Commands => "external_commands",
            Counter::Overflows => "livestatus_overflows",
            Counter::LogMessages => "log_messages",
            Counter::ServiceChecks => "service_checks",
            Counter::HostChecks => "host_checks",
            Counter::Forks => "forks",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
struct Slot {
    value: AtomicU64,
    rate: Average,
}

struct Sample {
    at: Instant,
    values: [u64; COUNTER_COUNT],
}

/// Monotonic counters with decaying per-second rates, plus gauges.
pub struct Counters {
    slots: [Slot; COUNTER_COUNT],
    last_sample: Mutex<Option<Sample>>,
    active_connections: AtomicI64,
    queued_connections: AtomicI64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::default()),
            last_sample: Mutex::new(None),
            active_connections: AtomicI64::new(0),
            queued_connections: AtomicI64::new(0),
        }
    }
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, counter: Counter) {
        self.slots[counter.index()].value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.slots[counter.index()].value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn value(&self, counter: Counter) -> u64 {
        self.slots[counter.index()].value.load(Ordering::Relaxed)
    }

    /// Increments per second, smoothed.
    pub fn rate(&self, counter: Counter) -> f64 {
        self.slots[counter.index()].rate.get()
    }

    /// Feeds the rates; called periodically by the daemon's timer.
    pub fn do_statistics(&self) {
        self.do_statistics_at(Instant::now());
    }

    pub fn do_statistics_at(&self, now: Instant) {
        let values: [u64; COUNTER_COUNT] = std::array::from_fn(|i| self.slots[i].value.load(Ordering::Relaxed));
        let mut last = self.last_sample.lock();
        if let Some(previous) = last.as_ref() {
            let elapsed = now.saturating_duration_since(previous.at).as_secs_f64();
            if elapsed > 0.0 {
                for (i, slot) in self.slots.iter().enumerate() {
                    let delta = values[i].saturating_sub(previous.values[i]) as f64;
                    slot.rate.update_at(delta / elapsed, now);
                }
            }
        }
        *last = Some(Sample { at: now, values });
    }

    pub fn connection_started(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_finished(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn set_queued_connections(&self, queued: usize) {
        self.queued_connections.store(queued as i64, Ordering::Relaxed);
    }

    pub fn queued_connections(&self) -> i64 {
        self.queued_connections.load(Ordering::Relaxed)
    }
}
