//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Backoff before retry number `attempt` (0 for the first retry):
/// `min(max, base * multiplier^attempt)` plus 0-10% jitter.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, multiplier: f64) -> Duration {
    let base_ms = base.as_millis() as f64;
    let max_ms = max.as_millis() as f64;

    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let delay_ms = (base_ms * multiplier.max(1.0).powi(exponent)).min(max_ms);
    let capped_delay = if delay_ms.is_finite() { delay_ms as u64 } else { max_ms as u64 };

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_backoff_calculation() {
        let b0 = calculate_backoff(0, ms(100), ms(2000), 2.0);
        assert!(b0 >= ms(100) && b0 < ms(110));

        let b1 = calculate_backoff(1, ms(100), ms(2000), 2.0);
        assert!(b1 >= ms(200) && b1 < ms(220));

        let b3 = calculate_backoff(3, ms(100), ms(2000), 3.0);
        assert!(b3 >= ms(2000) && b3 < ms(2200));
    }

    #[test]
    fn capped_at_max_for_large_attempts() {
        let delay = calculate_backoff(200, ms(100), ms(5000), 2.0);
        assert!(delay >= ms(5000) && delay < ms(5500));
    }

    #[test]
    fn tiny_delays_have_no_jitter() {
        assert_eq!(calculate_backoff(0, ms(5), ms(100), 2.0), ms(5));
        assert_eq!(calculate_backoff(4, Duration::ZERO, ms(100), 2.0), Duration::ZERO);
    }
}
