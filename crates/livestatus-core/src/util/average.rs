//! Time-decaying average used for rate statistics.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Weight of an old sample halves after this much time.
const HALF_LIFE: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct State {
    last_update: Option<Instant>,
    average: f64,
}

/// Exponentially weighted moving average.
///
/// Written by the statistics timer, read by query threads.
#[derive(Debug, Default)]
pub struct Average {
    state: Mutex<State>,
}

impl Average {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, value: f64) {
        self.update_at(value, Instant::now());
    }

    pub fn update_at(&self, value: f64, now: Instant) {
        let mut state = self.state.lock();
        state.average = match state.last_update {
            None => value,
            Some(last) => {
                let elapsed = now.saturating_duration_since(last).as_secs_f64();
                let weight = 0.5f64.powf(elapsed / HALF_LIFE.as_secs_f64());
                state.average * weight + value * (1.0 - weight)
            }
        };
        state.last_update = Some(now);
    }

    pub fn get(&self) -> f64 {
        self.state.lock().average
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_is_taken_verbatim() {
        let avg = Average::new();
        assert_eq!(avg.get(), 0.0);
        avg.update(8.0);
        assert_eq!(avg.get(), 8.0);
    }

    #[test]
    fn test_half_life_weighting() {
        let avg = Average::new();
        let start = Instant::now();
        avg.update_at(0.0, start);
        avg.update_at(10.0, start + HALF_LIFE);
        assert!((avg.get() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_instant_keeps_average() {
        let avg = Average::new();
        let now = Instant::now();
        avg.update_at(4.0, now);
        avg.update_at(100.0, now);
        assert_eq!(avg.get(), 4.0);
    }
}
