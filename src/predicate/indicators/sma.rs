//! Simple Moving Average.

/// Latest SMA value: mean of the last `period` closes.
pub fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_flat_series() {
        let closes = vec![10.0; 30];
        assert_eq!(sma(&closes, 20), Some(10.0));
    }

    #[test]
    fn test_sma_uses_most_recent_window() {
        let mut closes = vec![0.0; 10];
        closes.extend(vec![100.0; 5]);
        assert_eq!(sma(&closes, 5), Some(100.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let closes = vec![1.0, 2.0, 3.0];
        assert_eq!(sma(&closes, 4), None);
    }

    #[test]
    fn test_sma_zero_period() {
        assert_eq!(sma(&[1.0, 2.0], 0), None);
    }
}
