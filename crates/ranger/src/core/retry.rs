use std::time::Duration;

/// Delay before retry number `retry_count` (0-indexed): `base * 2^retry_count`.
///
/// Saturates instead of overflowing.
///
/// ```
/// use std::time::Duration;
/// use ranger::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_millis(100)), Duration::from_millis(100));
/// assert_eq!(retry_delay(2, Duration::from_millis(100)), Duration::from_millis(400));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_each_retry() {
        let base = Duration::from_millis(10);
        let delays: Vec<Duration> = (0..5).map(|i| retry_delay(i, base)).collect();
        for i in 1..delays.len() {
            assert_eq!(delays[i], delays[i - 1] * 2);
        }
    }

    #[test]
    fn test_zero_base_stays_zero() {
        assert_eq!(retry_delay(10, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_large_counts_saturate() {
        let delay = retry_delay(64, Duration::from_secs(u64::MAX / 2));
        assert_eq!(delay, Duration::MAX);
    }
}
