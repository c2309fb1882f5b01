//! Moving Average Convergence Divergence.

use super::ema::ema_series;

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Bars required for one MACD line + signal value.
pub const MACD_MIN_BARS: usize = MACD_SLOW + MACD_SIGNAL;

/// Latest MACD(12,26,9) line value: EMA(12) − EMA(26).
pub fn macd_line(closes: &[f64]) -> Option<f64> {
    if closes.len() < MACD_MIN_BARS {
        return None;
    }

    let fast = ema_series(closes, MACD_FAST);
    let slow = ema_series(closes, MACD_SLOW);

    if fast.is_empty() || slow.is_empty() {
        return None;
    }

    // Align the two series; fast starts earlier.
    let offset = MACD_SLOW - MACD_FAST;
    let line: Vec<f64> = fast
        .iter()
        .skip(offset)
        .zip(slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    line.last().copied()
}
