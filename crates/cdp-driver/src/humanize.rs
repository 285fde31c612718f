//! Human-mimicry pacing helpers.

use rand::Rng;
use std::time::Duration;

/// Pick a jittered duration in `[min_ms, max_ms]`.
pub fn jitter_ms(min_ms: u64, max_ms: u64) -> u64 {
    if max_ms <= min_ms {
        return min_ms;
    }
    rand::thread_rng().gen_range(min_ms..=max_ms)
}

/// Sleep for a jittered duration so interaction timing does not look
/// machine-regular.
pub async fn random_delay(min_ms: u64, max_ms: u64) {
    let ms = jitter_ms(min_ms, max_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_range() {
        for _ in 0..100 {
            let ms = jitter_ms(200, 400);
            assert!((200..=400).contains(&ms));
        }
    }

    #[test]
    fn degenerate_range_returns_min() {
        assert_eq!(jitter_ms(500, 500), 500);
        assert_eq!(jitter_ms(500, 100), 500);
    }
}
