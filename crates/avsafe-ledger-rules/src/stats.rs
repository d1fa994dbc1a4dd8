//! Sample statistics for descriptor series.

/// Arithmetic mean, `None` for an empty sample.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// The `p`-th percentile (0..=100) by linear interpolation between the
/// closest ranks. `p <= 0` is the minimum and `p >= 100` the maximum.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

/// [`percentile`] over an already ascending sample, `None` when empty.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    if p <= 0.0 {
        return Some(sorted[0]);
    }
    if p >= 100.0 {
        return Some(sorted[last]);
    }
    let k = last as f64 * (p / 100.0);
    let lo = k.floor() as usize;
    let hi = k.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (k - lo as f64))
}

/// Share of `values` strictly above `limit`, in percent. Zero when empty.
pub fn pct_over(values: &[f64], limit: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let over = values.iter().filter(|v| **v > limit).count();
    100.0 * over as f64 / values.len() as f64
}
