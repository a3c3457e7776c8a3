//! Drift tracking for loops that must keep a fixed period.
//!
//! A [`TimingRegularizer`] compares the average of the last few measured
//! durations against a target period. A positive difference means the loop is
//! running fast and can wait that long; a negative one means it is behind.

use std::collections::VecDeque;
use std::time::Duration;

/// Rolling average of recent durations against a target period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRegularizer {
    standard: Duration,
    recent: VecDeque<Duration>,
}

impl TimingRegularizer {
    /// Number of measurements averaged.
    pub const WINDOW: usize = 3;

    /// A regularizer targeting `standard` per iteration.
    pub fn new(standard: Duration) -> Self {
        Self {
            standard,
            recent: VecDeque::with_capacity(Self::WINDOW),
        }
    }

    /// The target period.
    pub fn standard(&self) -> Duration {
        self.standard
    }

    /// Records one measured duration, evicting the oldest once the window is full.
    pub fn record(&mut self, measured: Duration) {
        if self.recent.len() == Self::WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(measured);
        tracing::trace!(
            "timing: measured {measured:?}, average {:?} of {:?}",
            self.average(),
            self.standard
        );
    }

    /// Measurements currently in the window, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = Duration> + '_ {
        self.recent.iter().copied()
    }

    /// Mean of the recorded durations.
    ///
    /// With nothing recorded yet this is half the target period.
    pub fn average(&self) -> Duration {
        if self.recent.is_empty() {
            return self.standard / 2;
        }
        let total: u128 = self.recent.iter().map(Duration::as_nanos).sum();
        let mean = total / self.recent.len() as u128;
        Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX))
    }

    /// Target minus average, in nanoseconds.
    ///
    /// Positive when iterations finish early, negative when they overrun.
    pub fn timing_difference(&self) -> i128 {
        self.standard.as_nanos() as i128 - self.average().as_nanos() as i128
    }

    /// How long to wait to stay on the target period, if running early.
    pub fn slack(&self) -> Option<Duration> {
        self.standard.checked_sub(self.average()).filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_empty_average_is_half_the_standard() {
        let regularizer = TimingRegularizer::new(ms(10));
        assert_eq!(regularizer.average(), ms(5));
        assert_eq!(regularizer.timing_difference(), 5_000_000);
    }

    #[test]
    fn test_average_of_recorded() {
        let mut regularizer = TimingRegularizer::new(ms(10));
        regularizer.record(ms(9));
        regularizer.record(ms(11));
        regularizer.record(ms(10));
        assert_eq!(regularizer.average(), ms(10));
        assert_eq!(regularizer.timing_difference(), 0);
        assert_eq!(regularizer.slack(), None);
    }

    #[test]
    fn test_window_keeps_last_three() {
        let mut regularizer = TimingRegularizer::new(ms(10));
        for value in [100, 4, 6, 8] {
            regularizer.record(ms(value));
        }
        assert_eq!(regularizer.recent().collect::<Vec<_>>(), vec![ms(4), ms(6), ms(8)]);
        assert_eq!(regularizer.average(), ms(6));
        assert_eq!(regularizer.slack(), Some(ms(4)));
    }

    #[test]
    fn test_overrun_is_negative() {
        let mut regularizer = TimingRegularizer::new(ms(10));
        regularizer.record(ms(13));
        assert_eq!(regularizer.timing_difference(), -3_000_000);
        assert_eq!(regularizer.slack(), None);
    }

    #[test]
    fn test_integer_mean_truncates() {
        let mut regularizer = TimingRegularizer::new(Duration::from_nanos(10));
        regularizer.record(Duration::from_nanos(1));
        regularizer.record(Duration::from_nanos(2));
        assert_eq!(regularizer.average(), Duration::from_nanos(1));
    }
}
