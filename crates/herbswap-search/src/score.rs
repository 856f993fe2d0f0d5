// Match scorer
//
// Converts a fitted distance into a percentage relative to the target's own
// magnitude. A delta equal to the target variance scores 0% (no better than
// supplying nothing); a delta above it scores negative, which is the signal
// that nothing in the database approximates the target at all.

/// Match ratio in `[-inf, 1]`: `1 - delta/variance`.
///
/// A zero-variance (empty) target trivially matches anything with ratio 1.
pub fn match_ratio(delta: f64, variance: f64) -> f64 {
    if variance > 0.0 {
        1.0 - delta / variance
    } else {
        1.0
    }
}

/// Match ratio expressed as a percentage.
pub fn match_percentage(delta: f64, variance: f64) -> f64 {
    match_ratio(delta, variance) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_match_ratio_against_unit_variance() {
        assert_close(match_ratio(0.0, 1.0), 1.0);
        assert_close(match_ratio(0.1, 1.0), 0.9);
        assert_close(match_ratio(0.5, 1.0), 0.5);
        assert_close(match_ratio(1.0, 1.0), 0.0);
    }

    #[test]
    fn test_match_ratio_can_go_negative() {
        assert_close(match_ratio(0.0, 0.5), 1.0);
        assert_close(match_ratio(0.1, 0.5), 0.8);
        assert_close(match_ratio(0.5, 0.5), 0.0);
        assert_close(match_ratio(1.0, 0.5), -1.0);
    }

    #[test]
    fn test_empty_target_always_matches() {
        assert_close(match_ratio(0.0, 0.0), 1.0);
        assert_close(match_ratio(0.1, 0.0), 1.0);
        assert_close(match_ratio(1.0, 0.0), 1.0);
    }

    #[test]
    fn test_percentage() {
        assert_close(match_percentage(0.0, 1.0), 100.0);
        assert_close(match_percentage(1.0, 1.0), 0.0);
        // An empty combination against a non-empty target has
        // delta == variance, so it scores exactly 0%, never 100%.
        assert_close(match_percentage(5.0, 5.0), 0.0);
    }
}
