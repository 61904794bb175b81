//! Receive-liveness tracking.
//!
//! A fixed window of the six most recent receive timestamps, sampled
//! at 1 Hz by the owning runtime. The derived numbers mirror what a
//! traffic display wants: messages per second, time since the last
//! packet, and whether the connection has ever decoded anything.

use std::collections::VecDeque;
use std::time::Instant;

/// Number of receive timestamps kept.
pub const SAMPLE_WINDOW: usize = 6;

/// Silence value reported before any packet has ever arrived.
pub const SILENCE_CEILING_MS: u64 = 11_000;

/// One liveness sample, emitted every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyReport {
    /// Average receive rate in messages per second, `0.0` with fewer
    /// than two samples in the window.
    pub rate: f64,
    /// Milliseconds since the most recent packet, or
    /// [`SILENCE_CEILING_MS`] if none ever arrived.
    pub silence_ms: u64,
    /// Latched true by the first successful decode.
    pub ever_worked: bool,
}

/// Sliding window of receive timestamps for one connection.
#[derive(Debug, Default)]
pub struct LivenessTracker {
    samples: VecDeque<Instant>,
    ever_worked: bool,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(SAMPLE_WINDOW),
            ever_worked: false,
        }
    }

    /// Record a successful receive. The oldest sample is evicted once
    /// the window is full.
    pub fn record(&mut self, at: Instant) {
        if self.samples.len() >= SAMPLE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(at);
        self.ever_worked = true;
    }

    /// Compute the current report as of `now`.
    pub fn report(&self, now: Instant) -> FrequencyReport {
        FrequencyReport {
            rate: self.rate(),
            silence_ms: self.silence_ms(now),
            ever_worked: self.ever_worked,
        }
    }

    /// Average inter-arrival interval inverted to messages/second.
    /// The mean interval is rounded to whole milliseconds before
    /// inversion so display values don't jitter.
    fn rate(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }

        let mut total_ms = 0.0;
        let mut intervals = 0u32;
        for pair in self.samples.iter().zip(self.samples.iter().skip(1)) {
            total_ms += pair.1.duration_since(*pair.0).as_secs_f64() * 1000.0;
            intervals += 1;
        }

        let mean = (total_ms / f64::from(intervals)).round();
        if mean <= 0.0 {
            0.0
        } else {
            1000.0 / mean
        }
    }

    fn silence_ms(&self, now: Instant) -> u64 {
        match self.samples.back() {
            Some(last) => now.duration_since(*last).as_millis() as u64,
            None => SILENCE_CEILING_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_window() {
        let tracker = LivenessTracker::new();
        let report = tracker.report(Instant::now());

        assert_eq!(report.rate, 0.0);
        assert_eq!(report.silence_ms, SILENCE_CEILING_MS);
        assert!(!report.ever_worked);
    }

    #[test]
    fn test_single_sample_has_no_rate() {
        let base = Instant::now();
        let mut tracker = LivenessTracker::new();
        tracker.record(base);

        let report = tracker.report(base + Duration::from_millis(250));
        assert_eq!(report.rate, 0.0);
        assert_eq!(report.silence_ms, 250);
        assert!(report.ever_worked);
    }

    #[test]
    fn test_steady_two_hertz_stream() {
        let base = Instant::now();
        let mut tracker = LivenessTracker::new();
        for i in 0..SAMPLE_WINDOW {
            tracker.record(base + Duration::from_millis(500 * i as u64));
        }

        let now = base + Duration::from_millis(500 * SAMPLE_WINDOW as u64);
        let report = tracker.report(now);

        assert!((report.rate - 2.0).abs() < 1e-9);
        assert_eq!(report.silence_ms, 500);
        assert!(report.ever_worked);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let base = Instant::now();
        let mut tracker = LivenessTracker::new();

        // Slow samples first, then a fast burst that fills the window.
        for i in 0..4 {
            tracker.record(base + Duration::from_millis(2000 * i));
        }
        for i in 0..SAMPLE_WINDOW as u64 {
            tracker.record(base + Duration::from_millis(8000 + 100 * i));
        }

        // Only the burst remains: 100 ms mean interval -> 10 msg/s.
        let report = tracker.report(base + Duration::from_millis(8600));
        assert!((report.rate - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_ever_worked_never_resets() {
        let base = Instant::now();
        let mut tracker = LivenessTracker::new();
        tracker.record(base);

        // A long silence later the latch is still set.
        let report = tracker.report(base + Duration::from_secs(3600));
        assert!(report.ever_worked);
        assert_eq!(report.silence_ms, 3_600_000);
    }

    #[test]
    fn test_coincident_samples_do_not_divide_by_zero() {
        let base = Instant::now();
        let mut tracker = LivenessTracker::new();
        tracker.record(base);
        tracker.record(base);

        let report = tracker.report(base);
        assert_eq!(report.rate, 0.0);
    }
}
