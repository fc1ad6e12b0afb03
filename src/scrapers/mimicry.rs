//! Human-mimicry pacing helpers.
//!
//! Randomized waits and scroll amounts used to keep the request pattern
//! from looking machine-generated. The delay ranges are part of the
//! scraping contract with the target site, not tuning knobs.

use std::time::Duration;

use rand::Rng;

/// Sleep for a duration drawn uniformly from `[min_secs, max_secs)`.
pub async fn pause(min_secs: f64, max_secs: f64) {
    tokio::time::sleep(pause_duration(min_secs, max_secs)).await;
}

/// Pick a randomized pause duration without sleeping.
pub fn pause_duration(min_secs: f64, max_secs: f64) -> Duration {
    if max_secs <= min_secs {
        return Duration::from_secs_f64(min_secs.max(0.0));
    }
    let secs = rand::rng().random_range(min_secs..max_secs);
    Duration::from_secs_f64(secs)
}

/// Pick a scroll distance in pixels from `[min_px, max_px]`.
pub fn scroll_amount(min_px: u32, max_px: u32) -> u32 {
    if max_px <= min_px {
        return min_px;
    }
    rand::rng().random_range(min_px..=max_px)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_duration_stays_in_range() {
        for _ in 0..100 {
            let d = pause_duration(1.5, 3.0);
            assert!(d >= Duration::from_secs_f64(1.5));
            assert!(d < Duration::from_secs_f64(3.0));
        }
    }

    #[test]
    fn degenerate_range_returns_minimum() {
        assert_eq!(pause_duration(2.0, 2.0), Duration::from_secs_f64(2.0));
        assert_eq!(scroll_amount(100, 100), 100);
    }

    #[test]
    fn scroll_amount_stays_in_range() {
        for _ in 0..100 {
            let px = scroll_amount(50, 200);
            assert!((50..=200).contains(&px));
        }
    }
}
