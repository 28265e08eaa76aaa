//! Aggregation helpers.
//!
//! Every function here is total: empty inputs yield `0.0` instead of
//! dividing by zero or indexing out of bounds.

/// Nearest-rank percentile over samples that are already sorted ascending.
///
/// The rank is `floor(len * quantile)`, clamped to the last index, so a
/// single-sample input returns that sample for every quantile.
///
/// # Example
///
/// ```
/// use pulse_core::percentile;
///
/// let sorted: Vec<f64> = (1..=100).map(|i| (i * 10) as f64).collect();
/// assert_eq!(percentile(&sorted, 0.95), sorted[95]);
/// assert_eq!(percentile(&[42.0], 0.99), 42.0);
/// ```
pub fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() as f64 * quantile).floor() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// `part / total * 100`, `0.0` when `total` is zero.
pub fn ratio_percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Vec<f64> {
        (1..=100).map(|i| (i * 10) as f64).collect()
    }

    #[test]
    fn test_p95_uses_floor_rank() {
        let sorted = ladder();
        // floor(100 * 0.95) = 95 -> the 96th value
        assert_eq!(percentile(&sorted, 0.95), 960.0);
        assert_eq!(percentile(&sorted, 0.99), 1000.0);
    }

    #[test]
    fn test_single_sample_is_every_percentile() {
        assert_eq!(percentile(&[250.0], 0.95), 250.0);
        assert_eq!(percentile(&[250.0], 0.99), 250.0);
    }

    #[test]
    fn test_rank_is_clamped_to_last_index() {
        let sorted = [1.0, 2.0, 3.0];
        assert_eq!(percentile(&sorted, 1.0), 3.0);
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        assert_eq!(percentile(&[], 0.95), 0.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(ratio_percent(3, 0), 0.0);
    }

    #[test]
    fn test_ratio_and_rounding() {
        assert_eq!(ratio_percent(1, 10), 10.0);
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(mean(&[100.0, 300.0]), 200.0);
    }
}
