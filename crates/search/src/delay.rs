//! Poll pacing for running searches.
//!
//! Results trickle in slowly right after a search starts and again once it is
//! saturated, and arrive fastest in between. The delay follows a parabola over
//! progress: 5s at either end, 1s at the midpoint.

use std::time::Duration;

const MIN_DELAY_SECS: f64 = 0.5;
const MAX_DELAY_SECS: f64 = 5.0;

/// Fraction of `file_cap` reached, clamped to `[0, 1]`.
pub fn search_progress(file_count: u64, file_cap: u64) -> f64 {
    if file_cap == 0 {
        return 1.0;
    }
    (file_count as f64 / file_cap as f64).min(1.0)
}

/// Delay before the next poll at the given progress.
pub fn adaptive_delay(progress: f64) -> Duration {
    let seconds = 16.0 * progress * progress - 16.0 * progress + 5.0;
    Duration::from_secs_f64(seconds.clamp(MIN_DELAY_SECS, MAX_DELAY_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_curve_anchor_points() {
        assert_eq!(adaptive_delay(0.0), Duration::from_secs(5));
        assert_eq!(adaptive_delay(0.5), Duration::from_secs(1));
        assert_eq!(adaptive_delay(1.0), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_is_symmetric_and_bounded() {
        for step in 0..=100 {
            let p = step as f64 / 100.0;
            let delay = adaptive_delay(p);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_secs(5));
            let mirrored = adaptive_delay(1.0 - p);
            let diff = delay.as_secs_f64() - mirrored.as_secs_f64();
            assert!(diff.abs() < 1e-6, "asymmetric at {p}");
        }
    }

    #[test]
    fn test_delay_clamps_out_of_range_progress() {
        assert_eq!(adaptive_delay(-1.0), Duration::from_secs(5));
        assert_eq!(adaptive_delay(3.0), Duration::from_secs(5));
    }

    #[test]
    fn test_progress_saturates() {
        assert_eq!(search_progress(0, 10_000), 0.0);
        assert_eq!(search_progress(5_000, 10_000), 0.5);
        assert_eq!(search_progress(25_000, 10_000), 1.0);
        assert_eq!(search_progress(3, 0), 1.0);
    }
}
