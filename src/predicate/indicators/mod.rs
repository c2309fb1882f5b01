//! Indicator implementations used by the predicate evaluator.
//!
//! Each function returns the latest value of its series over a close-price
//! slice, or `None` when the slice is too short. The dispatcher below maps
//! `None` to a structured error naming the indicator and the shortfall.

pub mod ema;
pub mod linreg;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;

pub use ema::ema;
pub use linreg::linreg_slope;
pub use macd::{macd_line, MACD_MIN_BARS};
pub use roc::roc;
pub use rsi::rsi;
pub use sma::sma;

use super::PredicateError;

/// Indicator kinds referenceable from a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Rsi,
    Ema,
    Sma,
    Roc,
    LinRegSlope,
    /// Fixed 12/26/9 line value; carries no user period.
    Macd,
}

impl IndicatorKind {
    /// Match the alphabetic part of an indicator token, case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "RSI" => Some(IndicatorKind::Rsi),
            "EMA" => Some(IndicatorKind::Ema),
            "SMA" => Some(IndicatorKind::Sma),
            "ROC" => Some(IndicatorKind::Roc),
            "LINREGSLOPE" => Some(IndicatorKind::LinRegSlope),
            "MACD" => Some(IndicatorKind::Macd),
            _ => None,
        }
    }

    /// Whether the token requires a period (MACD alone does not).
    pub fn needs_period(&self) -> bool {
        !matches!(self, IndicatorKind::Macd)
    }

    pub fn display_name(&self, period: usize) -> String {
        match self {
            IndicatorKind::Rsi => format!("RSI({})", period),
            IndicatorKind::Ema => format!("EMA({})", period),
            IndicatorKind::Sma => format!("SMA({})", period),
            IndicatorKind::Roc => format!("ROC({})", period),
            IndicatorKind::LinRegSlope => format!("LinRegSlope({})", period),
            IndicatorKind::Macd => "MACD(12,26,9)".to_string(),
        }
    }

    /// Bars required before a value exists.
    pub fn min_bars(&self, period: usize) -> usize {
        match self {
            IndicatorKind::Macd => MACD_MIN_BARS,
            _ => period + 1,
        }
    }
}

/// Compute the latest value of `kind` over `closes`.
pub fn compute(
    kind: IndicatorKind,
    period: usize,
    closes: &[f64],
) -> Result<f64, PredicateError> {
    let needed = kind.min_bars(period);
    if closes.len() < needed {
        return Err(PredicateError::InsufficientData {
            indicator: kind.display_name(period),
            needed,
            got: closes.len(),
        });
    }

    let value = match kind {
        IndicatorKind::Rsi => rsi(closes, period),
        IndicatorKind::Ema => ema(closes, period),
        IndicatorKind::Sma => sma(closes, period),
        IndicatorKind::Roc => roc(closes, period),
        IndicatorKind::LinRegSlope => linreg_slope(closes, period),
        IndicatorKind::Macd => macd_line(closes),
    };

    value.ok_or(PredicateError::InsufficientData {
        indicator: kind.display_name(period),
        needed,
        got: closes.len(),
    })
}
