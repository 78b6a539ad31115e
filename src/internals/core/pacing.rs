use std::{
    thread,
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;

/// Longest single sleep while pausing, bounds how late a cancel is noticed.
const PAUSE_SLICE: Duration = Duration::from_millis(20);

/// Sleep for `duration` on the current thread, waking early if `token` is
/// cancelled. Returns `false` if the pause was cut short by cancellation.
pub fn pause(token: &CancellationToken, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(PAUSE_SLICE));
    }
}

/// Exponential log suppression for repeating failures: lets the 1st, 2nd,
/// 4th, 8th, ... occurrence through.
#[derive(Debug, Default)]
pub struct LogThrottle {
    occurrences: u64,
    last_logged: u64,
}

impl LogThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence. Returns `Some(suppressed)` when this one
    /// should be logged, with the number of occurrences skipped since the
    /// previous log line.
    pub fn record(&mut self) -> Option<u64> {
        self.occurrences += 1;
        if !self.occurrences.is_power_of_two() {
            return None;
        }
        let suppressed = self.occurrences - self.last_logged - 1;
        self.last_logged = self.occurrences;
        Some(suppressed)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_throttle_logs_powers_of_two() {
        let mut throttle = LogThrottle::new();
        let logged: Vec<(u64, u64)> = (1..=9u64)
            .filter_map(|n| throttle.record().map(|skipped| (n, skipped)))
            .collect();

        assert_eq!(logged, vec![(1, 0), (2, 0), (4, 1), (8, 3)]);
        assert_eq!(throttle.record(), None);

        throttle.reset();
        assert_eq!(throttle.record(), Some(0));
    }

    #[test]
    fn test_pause_runs_full_duration() {
        let token = CancellationToken::new();
        let started = Instant::now();
        assert!(pause(&token, Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_pause_stops_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let started = Instant::now();
        assert!(!pause(&token, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
