//! Predicate evaluator.
//!
//! Turns a Pine-Script-style boolean expression over close-price
//! indicators into `(met, values)` in two passes: collect references and
//! compute each one once, then rewrite and evaluate the expression.
//! Given the same closes and predicate, the result is bit-identical.

pub mod expr;
pub mod indicators;
pub mod scan;

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use expr::EvalError;
use indicators::IndicatorKind;
use scan::RefTarget;

/// Structured evaluation failure. Every variant is a configuration error
/// fatal to a monitor; transient data problems never reach this type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    #[error("not enough history for {indicator}: need {needed} bars, got {got}")]
    InsufficientData {
        indicator: String,
        needed: usize,
        got: usize,
    },

    #[error("indicator '{0}' requires a period (e.g. {0}14)")]
    MissingPeriod(String),

    #[error("syntax error in predicate '{text}': {detail}")]
    SyntaxError { text: String, detail: String },

    #[error("predicate did not evaluate to a boolean")]
    NonBooleanPredicate,
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub met: bool,
    /// Indicator readouts keyed by the reference's original spelling.
    pub values: BTreeMap<String, f64>,
}

impl Evaluation {
    /// Human-readable `name=value` listing for chat replies.
    pub fn values_summary(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("{}={:.2}", name, value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Evaluate `predicate` against an ascending close-price series.
pub fn evaluate(predicate: &str, closes: &[f64]) -> Result<Evaluation, PredicateError> {
    let refs = scan::collect(predicate)?;

    let mut cache: HashMap<(IndicatorKind, usize), f64> = HashMap::new();
    let mut values = BTreeMap::new();
    let mut params = BTreeMap::new();

    let mut rewritten = String::with_capacity(predicate.len());
    let mut cursor = 0;

    for reference in &refs {
        let value = match reference.target {
            RefTarget::Close => {
                closes
                    .last()
                    .copied()
                    .ok_or(PredicateError::InsufficientData {
                        indicator: "CLOSE".to_string(),
                        needed: 1,
                        got: 0,
                    })?
            }
            RefTarget::Indicator { kind, period, .. } => match cache.get(&(kind, period)) {
                Some(v) => *v,
                None => {
                    let v = indicators::compute(kind, period, closes)?;
                    cache.insert((kind, period), v);
                    v
                }
            },
        };

        values.insert(reference.spelling.clone(), value);

        let call_form = matches!(
            reference.target,
            RefTarget::Indicator {
                call_form: true,
                ..
            }
        );

        if call_form {
            // Splice the numeric literal over the call text.
            rewritten.push_str(&predicate[cursor..reference.start]);
            rewritten.push_str(&value.to_string());
            cursor = reference.end;
        } else {
            params.insert(reference.spelling.clone(), value);
        }
    }
    rewritten.push_str(&predicate[cursor..]);

    // A rewritten non-finite value prints as "NaN"/"inf"; binding both
    // keeps it flowing into the comparison check instead of failing as
    // an unknown identifier.
    params.insert("NaN".to_string(), f64::NAN);
    params.insert("inf".to_string(), f64::INFINITY);

    let met = expr::eval_bool(&rewritten, &params).map_err(|e| match e {
        EvalError::NonBoolean | EvalError::NanComparison => PredicateError::NonBooleanPredicate,
        other => PredicateError::SyntaxError {
            text: predicate.to_string(),
            detail: other.to_string(),
        },
    })?;

    Ok(Evaluation { met, values })
}
