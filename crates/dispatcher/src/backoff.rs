//! Retry backoff schedule.

/// Delay before the first retry.
pub const BACKOFF_BASE_MS: i64 = 5_000;

/// Upper bound on the retry delay.
pub const BACKOFF_CAP_MS: i64 = 30 * 60 * 1_000;

/// Delay before an item that has failed `attempts` times becomes
/// eligible again: `min(cap, base * 2^(attempts - 1))`.
pub fn backoff_delay_ms(attempts: i64) -> i64 {
    if attempts <= 1 {
        return BACKOFF_BASE_MS;
    }
    // Exponent clamped so the shift cannot overflow; anything this large
    // is far past the cap anyway.
    let exp = (attempts - 1).min(30) as u32;
    BACKOFF_BASE_MS
        .saturating_mul(1_i64 << exp)
        .min(BACKOFF_CAP_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_base() {
        assert_eq!(backoff_delay_ms(1), 5_000);
        assert_eq!(backoff_delay_ms(2), 10_000);
        assert_eq!(backoff_delay_ms(3), 20_000);
        assert_eq!(backoff_delay_ms(4), 40_000);
    }

    #[test]
    fn caps_at_thirty_minutes() {
        assert_eq!(backoff_delay_ms(20), BACKOFF_CAP_MS);
        assert_eq!(backoff_delay_ms(1_000), BACKOFF_CAP_MS);
    }

    #[test]
    fn is_monotonic_non_decreasing() {
        let mut previous = 0;
        for attempts in 1..=64 {
            let delay = backoff_delay_ms(attempts);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn zero_attempts_still_waits_the_base() {
        assert_eq!(backoff_delay_ms(0), BACKOFF_BASE_MS);
    }
}
