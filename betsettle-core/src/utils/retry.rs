use std::time::Duration;

/// Backoff exponent cap (2^11 = 2048 seconds max backoff).
pub const MAX_RETRY_EXPONENT: u32 = 11;

/// Calculate the next retry delay based on retry count.
///
/// Uses exponential backoff: 2^retry_count seconds.
pub fn calculate_retry_delay(retry_count: u32) -> Duration {
    let seconds = 2u64.pow(retry_count.min(MAX_RETRY_EXPONENT));
    Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_calculation() {
        assert_eq!(calculate_retry_delay(0), Duration::from_secs(1));
        assert_eq!(calculate_retry_delay(1), Duration::from_secs(2));
        assert_eq!(calculate_retry_delay(2), Duration::from_secs(4));
        assert_eq!(calculate_retry_delay(10), Duration::from_secs(1024));
        assert_eq!(calculate_retry_delay(11), Duration::from_secs(2048));
        // Max capped at 11
        assert_eq!(calculate_retry_delay(12), Duration::from_secs(2048));
        assert_eq!(calculate_retry_delay(100), Duration::from_secs(2048));
    }
}
