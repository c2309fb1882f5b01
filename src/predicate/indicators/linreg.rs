//! Linear regression slope.

/// Least-squares slope over the last `period` closes, with bar index as
/// the x axis. Positive means rising, in price units per bar.
pub fn linreg_slope(closes: &[f64], period: usize) -> Option<f64> {
    if period < 2 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let n = period as f64;

    let sum_x: f64 = (0..period).map(|i| i as f64).sum();
    let sum_y: f64 = window.iter().sum();
    let sum_xy: f64 = window.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..period).map(|i| (i as f64) * (i as f64)).sum();

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        return None;
    }

    Some((n * sum_xy - sum_x * sum_y) / denom)
}
