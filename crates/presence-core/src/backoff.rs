//! Randomized reconnect backoff.
//!
//! Each call grows the accumulated delay by a random share of up to twice
//! itself, capped at the configured maximum:
//!
//! ```text
//! d = min(max, d + d * 2 * U)      U uniform in [0, 1)
//! ```
//!
//! Growth is random so clients that lost the companion at the same moment do
//! not retry in lockstep.

use crate::config::SessionConfig;
use rand::Rng;
use std::time::Duration;

/// Reconnect delay generator.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            SessionConfig::RECONNECT_MIN_DELAY,
            SessionConfig::RECONNECT_MAX_DELAY,
        )
    }
}

impl Backoff {
    /// Create a backoff starting at `min`. `max` is raised to `min` if smaller.
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// The delay most recently returned (or `min` after a reset).
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Advance and return the next delay.
    pub fn next_delay(&mut self) -> Duration {
        self.next_delay_with(&mut rand::rng())
    }

    /// Advance using the supplied random source.
    pub fn next_delay_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let unit: f64 = rng.random();
        let current = self.current.as_secs_f64();
        let grown = current + current * 2.0 * unit;
        let capped = grown.min(self.max.as_secs_f64());

        self.current = Duration::try_from_secs_f64(capped)
            .unwrap_or(self.max)
            .clamp(self.min, self.max);
        self.current
    }

    /// Restore the minimum delay. Called once per successful connect.
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Render a delay for log output: `750 ms`, `1.5 s`, `2 m 5 s`.
pub fn format_duration(delay: Duration) -> String {
    let millis = delay.as_millis();

    if millis < 1000 {
        format!("{} ms", millis)
    } else if millis < 60_000 {
        let seconds = millis / 1000;
        let tenths = (millis % 1000) / 100;
        if tenths == 0 {
            format!("{} s", seconds)
        } else {
            format!("{}.{} s", seconds, tenths)
        }
    } else {
        let minutes = millis / 60_000;
        let seconds = (millis % 60_000) / 1000;
        if seconds == 0 {
            format!("{} m", minutes)
        } else {
            format!("{} m {} s", minutes, seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_delay_stays_within_bounds() {
        let min = Duration::from_millis(500);
        let max = Duration::from_secs(60);
        let mut backoff = Backoff::new(min, max);

        for _ in 0..10_000 {
            let delay = backoff.next_delay();
            assert!(delay >= min, "Delay {:?} below minimum", delay);
            assert!(delay <= max, "Delay {:?} above maximum", delay);
        }
    }

    #[test]
    fn test_delay_is_non_decreasing_until_capped() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5));
        let mut rng = StdRng::seed_from_u64(7);

        let mut previous = backoff.current();
        for _ in 0..200 {
            let delay = backoff.next_delay_with(&mut rng);
            assert!(delay >= previous);
            previous = delay;
        }
        assert_eq!(previous, Duration::from_secs(5));
    }

    #[test]
    fn test_reset_restores_minimum_exactly() {
        let min = Duration::from_millis(500);
        let mut backoff = Backoff::new(min, Duration::from_secs(60));

        for _ in 0..50 {
            backoff.next_delay();
        }
        backoff.reset();

        assert_eq!(backoff.current(), min);
    }

    #[test]
    fn test_max_below_min_is_raised() {
        let backoff = Backoff::new(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(backoff.max(), Duration::from_secs(3));
    }

    #[test]
    fn test_huge_maximum_does_not_overflow() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::MAX);
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..200 {
            let delay = backoff.next_delay_with(&mut rng);
            assert!(delay >= Duration::from_secs(1));
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(750)), "750 ms");
        assert_eq!(format_duration(Duration::from_millis(2000)), "2 s");
        assert_eq!(format_duration(Duration::from_millis(1530)), "1.5 s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2 m");
        assert_eq!(format_duration(Duration::from_secs(125)), "2 m 5 s");
    }
}
