//! Predicate evaluator integration tests: grammar, indicator resolution,
//! error taxonomy and determinism.

use vigil::predicate::{evaluate, PredicateError};

fn uptrend(count: usize) -> Vec<f64> {
    (0..count).map(|i| 100.0 + i as f64 * 1.5).collect()
}

fn downtrend(count: usize) -> Vec<f64> {
    (0..count).map(|i| 300.0 - i as f64 * 1.5).collect()
}

#[test]
fn test_rsi_oversold_predicate() {
    // A pure downtrend drives RSI to the floor.
    let eval = evaluate("RSI14 < 30", &downtrend(50)).unwrap();
    assert!(eval.met);
    assert!(eval.values["RSI14"] < 30.0);
}

#[test]
fn test_rsi_oversold_predicate_not_met() {
    let eval = evaluate("RSI14 < 30", &uptrend(50)).unwrap();
    assert!(!eval.met);
    assert!(eval.values["RSI14"] > 30.0);
}

#[test]
fn test_close_comparison() {
    let closes = vec![100.0, 101.0, 102.0];
    assert!(evaluate("CLOSE > 101", &closes).unwrap().met);
    assert!(!evaluate("CLOSE > 9999999", &closes).unwrap().met);
}

#[test]
fn test_function_call_forms() {
    let closes = uptrend(80);
    let eval = evaluate("ema(close, 12) > sma(close, 26)", &closes).unwrap();
    assert!(eval.met, "short EMA leads long SMA in an uptrend");
    assert!(eval.values.contains_key("ema(close, 12)"));
    assert!(eval.values.contains_key("sma(close, 26)"));
}

#[test]
fn test_suffix_and_call_forms_agree() {
    let closes = uptrend(80);
    let suffix = evaluate("SMA20 > 0", &closes).unwrap();
    let call = evaluate("sma(close, 20) > 0", &closes).unwrap();
    assert_eq!(suffix.values["SMA20"], call.values["sma(close, 20)"]);
}

#[test]
fn test_macd_line_sign_tracks_trend() {
    assert!(evaluate("MACD > 0", &uptrend(80)).unwrap().met);
    assert!(evaluate("MACD < 0", &downtrend(80)).unwrap().met);
}

#[test]
fn test_roc_and_linregslope() {
    let closes = uptrend(60);
    let eval = evaluate("ROC10 > 0 && LinRegSlope20 > 1", &closes).unwrap();
    assert!(eval.met);
    assert!((eval.values["LinRegSlope20"] - 1.5).abs() < 1e-9);
}

#[test]
fn test_compound_logic() {
    let closes = uptrend(80);
    let eval = evaluate("(RSI14 > 50 && MACD > 0) || CLOSE < 1", &closes).unwrap();
    assert!(eval.met);

    let eval = evaluate("!(RSI14 > 50) && MACD > 0", &closes).unwrap();
    assert!(!eval.met);
}

#[test]
fn test_insufficient_data_names_indicator() {
    let err = evaluate("EMA50 > 0", &uptrend(20)).unwrap_err();
    match err {
        PredicateError::InsufficientData { indicator, needed, got } => {
            assert_eq!(indicator, "EMA(50)");
            assert_eq!(needed, 51);
            assert_eq!(got, 20);
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn test_missing_period() {
    let err = evaluate("RSI < 30", &uptrend(50)).unwrap_err();
    assert_eq!(err, PredicateError::MissingPeriod("RSI".to_string()));
}

#[test]
fn test_syntax_errors() {
    let closes = uptrend(50);

    for bad in [
        "RSI14 <",
        "RSI14 < 30 &&",
        "(RSI14 < 30",
        "RSI14 >> 30",
        "sma(close) > 1",
        "sma(volume, 20) > 1",
        "FOO42 > 1",
    ] {
        let err = evaluate(bad, &closes).unwrap_err();
        assert!(
            matches!(err, PredicateError::SyntaxError { .. }),
            "'{}' should be a syntax error, got {:?}",
            bad,
            err
        );
    }
}

#[test]
fn test_non_boolean_predicates() {
    let closes = uptrend(50);
    for bad in ["RSI14", "42", "CLOSE"] {
        assert_eq!(
            evaluate(bad, &closes).unwrap_err(),
            PredicateError::NonBooleanPredicate,
            "'{}' should be non-boolean",
            bad
        );
    }
}

#[test]
fn test_unknown_identifier_is_syntax_error() {
    let err = evaluate("UNKNOWN_THING > 1", &uptrend(50)).unwrap_err();
    match err {
        PredicateError::SyntaxError { detail, .. } => {
            assert!(detail.contains("UNKNOWN_THING"));
        }
        other => panic!("expected SyntaxError, got {:?}", other),
    }
}

#[test]
fn test_determinism_law() {
    let closes = uptrend(100);
    let predicate = "RSI14 > 50 && (sma(close, 20) < CLOSE || MACD > 0) && ROC5 >= 0";

    let first = evaluate(predicate, &closes).unwrap();
    for _ in 0..10 {
        let again = evaluate(predicate, &closes).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn test_boundary_exactly_period_plus_one() {
    let closes = uptrend(15);
    assert!(evaluate("RSI14 > 0", &closes).is_ok());

    let closes = uptrend(14);
    assert!(matches!(
        evaluate("RSI14 > 0", &closes),
        Err(PredicateError::InsufficientData { .. })
    ));
}

#[test]
fn test_values_reported_for_every_reference() {
    let closes = uptrend(80);
    let eval = evaluate("RSI14 > 0 && EMA20 > 0 && MACD > -1000 && CLOSE > 0", &closes).unwrap();
    let keys: Vec<_> = eval.values.keys().cloned().collect();
    assert_eq!(keys, vec!["CLOSE", "EMA20", "MACD", "RSI14"]);
}
