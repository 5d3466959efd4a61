//! Moving-window block import rate estimator
//!
//! Each download slot keeps one `Rate` to score its peer's throughput.
//! Samples record when a block arrived and how long the organizer held it;
//! organizer time is excluded from the throughput figure so disk latency
//! does not distort peer performance scoring.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::download::RATE_WINDOW;

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    /// Time the organizer spent storing this block
    database: Duration,
    size: usize,
}

/// Per-slot moving-window rate record
#[derive(Debug, Clone)]
pub struct Rate {
    window: Duration,
    samples: VecDeque<Sample>,
}

impl Default for Rate {
    fn default() -> Self {
        Self::new(RATE_WINDOW)
    }
}

impl Rate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Append a sample for a block organized just now
    pub fn record(&mut self, block_size: usize, database: Duration) {
        self.record_at(Instant::now(), block_size, database);
    }

    /// Blocks per second over the window, excluding organizer time.
    /// `0.0` when no sample falls within the window.
    pub fn normal(&mut self) -> f64 {
        self.normal_at(Instant::now())
    }

    /// True if no sample has been recorded within the window
    pub fn idle(&mut self) -> bool {
        self.idle_at(Instant::now())
    }

    /// Fraction of window time spent inside the organizer
    pub fn ratio(&mut self) -> f64 {
        self.ratio_at(Instant::now())
    }

    /// Total bytes received within the window
    pub fn bytes(&mut self) -> usize {
        self.prune(Instant::now());
        self.samples.iter().map(|sample| sample.size).sum()
    }

    fn record_at(&mut self, now: Instant, block_size: usize, database: Duration) {
        self.samples.push_back(Sample {
            at: now,
            database,
            size: block_size,
        });
        self.prune(now);
    }

    fn normal_at(&mut self, now: Instant) -> f64 {
        self.prune(now);
        if self.samples.is_empty() {
            return 0.0;
        }
        let database: Duration = self.samples.iter().map(|sample| sample.database).sum();
        let effective = self.window.saturating_sub(database);
        if effective.is_zero() {
            return 0.0;
        }
        self.samples.len() as f64 / effective.as_secs_f64()
    }

    fn idle_at(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.samples.is_empty()
    }

    fn ratio_at(&mut self, now: Instant) -> f64 {
        self.prune(now);
        let database: Duration = self.samples.iter().map(|sample| sample.database).sum();
        database.as_secs_f64() / self.window.as_secs_f64()
    }

    /// Drop samples older than the window
    fn prune(&mut self, now: Instant) {
        let horizon = now.checked_sub(self.window);
        if let Some(horizon) = horizon {
            while matches!(self.samples.front(), Some(sample) if sample.at < horizon) {
                self.samples.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    #[test]
    fn test_idle_implies_zero_rate() {
        let mut rate = Rate::new(WINDOW);
        let now = Instant::now();
        assert!(rate.idle_at(now));
        assert_eq!(rate.normal_at(now), 0.0);
    }

    #[test]
    fn test_normal_counts_events_over_window() {
        let mut rate = Rate::new(WINDOW);
        let start = Instant::now();
        for i in 0..10 {
            rate.record_at(start + Duration::from_millis(100 * i), 1000, Duration::ZERO);
        }
        let now = start + Duration::from_secs(1);
        assert!(!rate.idle_at(now));
        // 10 events over a 5 second window.
        let normal = rate.normal_at(now);
        assert!((normal - 2.0).abs() < 1e-9, "normal was {normal}");
    }

    #[test]
    fn test_database_time_excluded_from_rate() {
        let mut rate = Rate::new(WINDOW);
        let start = Instant::now();
        // 5 blocks, each costing 400ms of organizer time: 2s of the 5s
        // window belongs to the store, so the peer is scored over 3s.
        for i in 0..5 {
            rate.record_at(
                start + Duration::from_millis(100 * i),
                1000,
                Duration::from_millis(400),
            );
        }
        let now = start + Duration::from_secs(1);
        let normal = rate.normal_at(now);
        assert!((normal - 5.0 / 3.0).abs() < 1e-9, "normal was {normal}");
        let ratio = rate.ratio_at(now);
        assert!((ratio - 0.4).abs() < 1e-9, "ratio was {ratio}");
    }

    #[test]
    fn test_samples_age_out_of_window() {
        let mut rate = Rate::new(WINDOW);
        let start = Instant::now();
        rate.record_at(start, 1000, Duration::ZERO);
        assert!(!rate.idle_at(start + Duration::from_secs(4)));
        assert!(rate.idle_at(start + Duration::from_secs(6)));
        assert_eq!(rate.normal_at(start + Duration::from_secs(6)), 0.0);
    }

    #[test]
    fn test_bytes_sums_window_sizes() {
        let mut rate = Rate::new(WINDOW);
        rate.record(500, Duration::ZERO);
        rate.record(700, Duration::ZERO);
        assert_eq!(rate.bytes(), 1200);
    }
}
