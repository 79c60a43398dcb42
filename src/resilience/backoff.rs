//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `max`, plus up to 10% jitter. Attempt 0 waits nothing.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_then_caps() {
        assert_eq!(calculate_backoff(0, 500, 30_000), Duration::ZERO);

        let first = calculate_backoff(1, 500, 30_000).as_millis();
        assert!((500..550).contains(&first));

        let third = calculate_backoff(3, 500, 30_000).as_millis();
        assert!((2_000..2_200).contains(&third));

        let capped = calculate_backoff(40, 500, 30_000).as_millis();
        assert!((30_000..33_000).contains(&capped));
    }
}
