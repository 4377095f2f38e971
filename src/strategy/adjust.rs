//! Probability adjustment by opponent defensive rank.
//!
//! A flat heuristic: the raw hit-rate is scaled down against top defenses
//! and up against weak ones. Not calibrated.

/// Multiplier applied to the hit-rate for a defensive rank (1 = best).
pub fn rank_multiplier(rank: u32) -> f64 {
    match rank {
        0..=5 => 0.80,
        6..=10 => 0.90,
        11..=20 => 1.00,
        21..=25 => 1.10,
        _ => 1.20,
    }
}

/// Adjusted probability; unknown when either input is unknown.
///
/// The result is not clamped and may exceed 1.
pub fn adjust_probability(hit_rate: Option<f64>, rank: Option<u32>) -> Option<f64> {
    Some(hit_rate? * rank_multiplier(rank?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_rank_table() {
        assert!(approx(adjust_probability(Some(0.6), Some(3)).unwrap(), 0.48));
        assert!(approx(adjust_probability(Some(0.6), Some(8)).unwrap(), 0.54));
        assert!(approx(adjust_probability(Some(0.6), Some(15)).unwrap(), 0.60));
        assert!(approx(adjust_probability(Some(0.6), Some(23)).unwrap(), 0.66));
        assert!(approx(adjust_probability(Some(0.6), Some(30)).unwrap(), 0.72));
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(rank_multiplier(5), 0.80);
        assert_eq!(rank_multiplier(6), 0.90);
        assert_eq!(rank_multiplier(10), 0.90);
        assert_eq!(rank_multiplier(11), 1.00);
        assert_eq!(rank_multiplier(20), 1.00);
        assert_eq!(rank_multiplier(21), 1.10);
        assert_eq!(rank_multiplier(25), 1.10);
        assert_eq!(rank_multiplier(26), 1.20);
    }

    #[test]
    fn test_unknown_propagates() {
        assert_eq!(adjust_probability(None, Some(15)), None);
        assert_eq!(adjust_probability(Some(0.8), None), None);
    }

    #[test]
    fn test_may_exceed_one() {
        let p = adjust_probability(Some(1.0), Some(28)).unwrap();
        assert!(p > 1.0);
    }
}
