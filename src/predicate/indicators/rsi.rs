//! Relative Strength Index.

/// Latest RSI value over the close series using Wilder smoothing.
/// Requires `period + 1` closes to form the first `period` changes.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);

    for pair in closes.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let mut avg_gain: f64 = gains.iter().take(period).sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses.iter().take(period).sum::<f64>() / period as f64;

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uptrend(count: usize) -> Vec<f64> {
        (0..count).map(|i| 100.0 + i as f64 * 1.5).collect()
    }

    fn downtrend(count: usize) -> Vec<f64> {
        (0..count).map(|i| 200.0 - i as f64 * 1.5).collect()
    }

    #[test]
    fn test_rsi_pure_uptrend_is_100() {
        assert_eq!(rsi(&uptrend(50), 14), Some(100.0));
    }

    #[test]
    fn test_rsi_downtrend_is_low() {
        let value = rsi(&downtrend(50), 14).unwrap();
        assert!(value < 20.0, "RSI in pure downtrend should be low, got {}", value);
    }

    #[test]
    fn test_rsi_range() {
        let mixed: Vec<f64> = (0..60)
            .map(|i| 100.0 + if i % 2 == 0 { 2.0 } else { -1.0 } * i as f64 * 0.1)
            .collect();
        let value = rsi(&mixed, 14).unwrap();
        assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn test_rsi_needs_period_plus_one() {
        assert_eq!(rsi(&uptrend(14), 14), None);
        assert!(rsi(&uptrend(15), 14).is_some());
    }
}
