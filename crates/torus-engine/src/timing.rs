//! Tick timing for the driver loop.
//!
//! Keeps a rolling window of tick durations and paces the loop to a target
//! tick rate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Maximum samples kept for averaging.
const MAX_SAMPLES: usize = 120;

/// Tick pacing and duration statistics.
#[derive(Debug)]
pub struct TickTimer {
    /// Time budget per tick (None = unthrottled)
    tick_budget: Option<Duration>,
    /// Start of the current tick
    tick_start: Instant,
    /// Recent tick durations
    samples: VecDeque<Duration>,
    /// Longest tick seen
    worst: Duration,
}

impl TickTimer {
    /// Creates a timer. A rate of 0 disables pacing.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_budget =
            (tick_rate > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(tick_rate)));
        Self {
            tick_budget,
            tick_start: Instant::now(),
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            worst: Duration::ZERO,
        }
    }

    /// Marks the start of a tick.
    pub fn begin(&mut self) {
        self.tick_start = Instant::now();
    }

    /// Marks the end of a tick, records its duration and sleeps out the
    /// rest of the budget. Returns the work duration.
    pub fn end(&mut self) -> Duration {
        let elapsed = self.tick_start.elapsed();
        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed);
        self.worst = self.worst.max(elapsed);

        if let Some(budget) = self.tick_budget {
            if let Some(remaining) = budget.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        elapsed
    }

    /// Average tick duration in milliseconds over the recent window.
    #[must_use]
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: Duration = self.samples.iter().sum();
        total.as_secs_f64() * 1000.0 / self.samples.len() as f64
    }

    /// Longest tick in milliseconds.
    #[must_use]
    pub fn worst_ms(&self) -> f64 {
        self.worst.as_secs_f64() * 1000.0
    }

    /// Number of samples in the window.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unthrottled_records_samples() {
        let mut timer = TickTimer::new(0);
        assert_eq!(timer.average_ms(), 0.0);
        for _ in 0..3 {
            timer.begin();
            timer.end();
        }
        assert_eq!(timer.sample_count(), 3);
        assert!(timer.worst_ms() >= 0.0);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut timer = TickTimer::new(0);
        for _ in 0..(MAX_SAMPLES + 10) {
            timer.begin();
            timer.end();
        }
        assert_eq!(timer.sample_count(), MAX_SAMPLES);
    }

    #[test]
    fn test_paced_tick_takes_budget() {
        let mut timer = TickTimer::new(100);
        let start = Instant::now();
        timer.begin();
        timer.end();
        assert!(start.elapsed() >= Duration::from_millis(9));
    }
}
