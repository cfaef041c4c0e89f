//! Per-minute snapshot of which timeperiods are active.

use std::collections::HashMap;

use chrono::{DateTime, Local, Timelike};
use parking_lot::Mutex;
use tracing::debug;

use crate::core::MonitoringCore;

#[derive(Default)]
struct State {
    /// Minute (epoch seconds / 60) of the last refresh.
    last_update: Option<i64>,
    active: HashMap<String, bool>,
}

/// Written by the timer thread, read by queries.
#[derive(Default)]
pub struct TimeperiodsCache {
    state: Mutex<State>,
}

impl TimeperiodsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes all timeperiods unless already done in this minute.
    pub fn update(&self, now: &DateTime<Local>, core: &dyn MonitoringCore) {
        let minute = now.timestamp() / 60;
        let mut state = self.state.lock();
        if state.last_update == Some(minute) {
            return;
        }
        let now = now.with_second(0).unwrap_or(*now);
        let mut active = HashMap::new();
        core.all_of_timeperiods(&mut |tp| {
            active.insert(tp.name.clone(), core.is_in_timeperiod(&tp.name, &now));
            true
        });
        debug!("timeperiods cache refreshed: {} periods", active.len());
        state.active = active;
        state.last_update = Some(minute);
    }

    /// Unknown or empty names count as active.
    pub fn in_timeperiod(&self, name: &str) -> bool {
        if name.is_empty() {
            return true;
        }
        self.state.lock().active.get(name).copied().unwrap_or(true)
    }
}
