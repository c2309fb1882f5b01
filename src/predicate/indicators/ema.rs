//! Exponential Moving Average.

/// Latest EMA value. The first EMA is seeded with the SMA of the first
/// `period` closes, then smoothed across the remainder.
pub fn ema(closes: &[f64], period: usize) -> Option<f64> {
    ema_series(closes, period).last().copied()
}

/// Full EMA series (one value per close from index `period - 1` on).
/// Shared with the MACD calculation.
pub(crate) fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut series = Vec::with_capacity(values.len() - period + 1);

    let sma: f64 = values.iter().take(period).sum::<f64>() / period as f64;
    series.push(sma);

    for value in values.iter().skip(period) {
        let prev = *series.last().expect("seeded above");
        series.push((value - prev) * multiplier + prev);
    }

    series
}
