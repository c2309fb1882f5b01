//! First pass of the evaluator: collect indicator references.
//!
//! Finds period-suffix tokens (`RSI14`), function-call forms
//! (`sma(close, 20)`), bare `MACD` and the `CLOSE` alias, with their byte
//! spans so the call forms can be rewritten to numeric literals.

use super::indicators::IndicatorKind;
use super::PredicateError;

/// One indicator reference found in the predicate text.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Exact text as the user wrote it; also the reporting key.
    pub spelling: String,
    /// Byte span in the predicate.
    pub start: usize,
    pub end: usize,
    pub target: RefTarget,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefTarget {
    Indicator {
        kind: IndicatorKind,
        period: usize,
        /// Call forms are rewritten to literals; suffix forms stay as
        /// identifiers bound in the parameter map.
        call_form: bool,
    },
    Close,
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_letters(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphabetic() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn read_digits(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn syntax(&self, detail: impl Into<String>) -> PredicateError {
        PredicateError::SyntaxError {
            text: self.input.to_string(),
            detail: detail.into(),
        }
    }

    fn parse_period(&mut self, token: &str) -> Result<usize, PredicateError> {
        let digits = self.read_digits();
        if digits.is_empty() {
            return Err(self.syntax(format!("expected period in '{}'", token)));
        }
        let period: usize = digits
            .parse()
            .map_err(|_| self.syntax(format!("period out of range in '{}'", token)))?;
        if period == 0 {
            return Err(self.syntax(format!("period must be positive in '{}'", token)));
        }
        Ok(period)
    }

    /// Parse the tail of `name(close, N)`; `name` has been consumed.
    fn parse_call(
        &mut self,
        name: &str,
        start: usize,
    ) -> Result<Reference, PredicateError> {
        let kind = match IndicatorKind::from_name(name) {
            Some(k @ (IndicatorKind::Sma | IndicatorKind::Ema | IndicatorKind::Rsi)) => k,
            _ => return Err(self.syntax(format!("unknown function '{}'", name))),
        };

        self.skip_whitespace();
        if self.peek() != Some('(') {
            return Err(self.syntax(format!("expected '(' after '{}'", name)));
        }
        self.advance();

        self.skip_whitespace();
        let arg = self.read_letters();
        if !arg.eq_ignore_ascii_case("close") {
            return Err(self.syntax(format!(
                "'{}' takes 'close' as its first argument, found '{}'",
                name, arg
            )));
        }

        self.skip_whitespace();
        if self.peek() != Some(',') {
            return Err(self.syntax(format!("expected ',' in '{}(close, N)'", name)));
        }
        self.advance();

        self.skip_whitespace();
        let period = self.parse_period(name)?;

        self.skip_whitespace();
        if self.peek() != Some(')') {
            return Err(self.syntax(format!("expected ')' in '{}(close, N)'", name)));
        }
        self.advance();

        Ok(Reference {
            spelling: self.input[start..self.pos].to_string(),
            start,
            end: self.pos,
            target: RefTarget::Indicator {
                kind,
                period,
                call_form: true,
            },
        })
    }
}

/// Collect every indicator reference in the predicate, left to right.
///
/// Unrecognized bare words are left in place; they surface as unknown
/// identifiers when the rewritten predicate is evaluated.
pub fn collect(text: &str) -> Result<Vec<Reference>, PredicateError> {
    let mut scanner = Scanner {
        input: text,
        pos: 0,
    };
    let mut refs = Vec::new();

    while let Some(ch) = scanner.peek() {
        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = scanner.pos;
            let letters = scanner.read_letters();
            let digits = scanner.read_digits();

            if !digits.is_empty() {
                // Period-suffix form, e.g. RSI14.
                let kind = IndicatorKind::from_name(letters).ok_or_else(|| {
                    scanner.syntax(format!("unknown indicator '{}{}'", letters, digits))
                })?;
                if kind == IndicatorKind::Macd {
                    return Err(scanner.syntax("MACD takes no period (fixed 12,26,9)"));
                }
                let period: usize = digits.parse().map_err(|_| {
                    scanner.syntax(format!("period out of range in '{}{}'", letters, digits))
                })?;
                if period == 0 {
                    return Err(scanner
                        .syntax(format!("period must be positive in '{}{}'", letters, digits)));
                }

                refs.push(Reference {
                    spelling: text[start..scanner.pos].to_string(),
                    start,
                    end: scanner.pos,
                    target: RefTarget::Indicator {
                        kind,
                        period,
                        call_form: false,
                    },
                });
            } else if letters.eq_ignore_ascii_case("close") {
                refs.push(Reference {
                    spelling: letters.to_string(),
                    start,
                    end: scanner.pos,
                    target: RefTarget::Close,
                });
            } else if scanner.remaining().trim_start().starts_with('(') {
                refs.push(scanner.parse_call(letters, start)?);
            } else {
                match IndicatorKind::from_name(letters) {
                    Some(IndicatorKind::Macd) => refs.push(Reference {
                        spelling: letters.to_string(),
                        start,
                        end: scanner.pos,
                        target: RefTarget::Indicator {
                            kind: IndicatorKind::Macd,
                            period: 0,
                            call_form: false,
                        },
                    }),
                    Some(_) => {
                        return Err(PredicateError::MissingPeriod(letters.to_string()));
                    }
                    None => {
                        // Not an indicator; the evaluator reports it.
                    }
                }
            }
        } else if ch.is_ascii_digit() || ch == '.' {
            // Skip over a numeric literal so its digits are not mistaken
            // for a period suffix.
            while let Some(c) = scanner.peek() {
                if c.is_ascii_digit() || c == '.' {
                    scanner.advance();
                } else {
                    break;
                }
            }
        } else {
            scanner.advance();
        }
    }

    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_form() {
        let refs = collect("RSI14 < 30").unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].spelling, "RSI14");
        assert_eq!(
            refs[0].target,
            RefTarget::Indicator {
                kind: IndicatorKind::Rsi,
                period: 14,
                call_form: false
            }
        );
    }

    #[test]
    fn test_call_form_case_insensitive() {
        let refs = collect("SMA(close, 20) > ema(CLOSE,50)").unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].spelling, "SMA(close, 20)");
        assert!(matches!(
            refs[0].target,
            RefTarget::Indicator {
                kind: IndicatorKind::Sma,
                period: 20,
                call_form: true
            }
        ));
        assert_eq!(refs[1].spelling, "ema(CLOSE,50)");
    }

    #[test]
    fn test_bare_close_and_macd() {
        let refs = collect("CLOSE > 100 && MACD > 0").unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].target, RefTarget::Close);
        assert!(matches!(
            refs[1].target,
            RefTarget::Indicator {
                kind: IndicatorKind::Macd,
                ..
            }
        ));
    }

    #[test]
    fn test_lowercase_close() {
        let refs = collect("close > 100").unwrap();
        assert_eq!(refs[0].spelling, "close");
        assert_eq!(refs[0].target, RefTarget::Close);
    }

    #[test]
    fn test_missing_period() {
        let err = collect("RSI < 30").unwrap_err();
        assert_eq!(err, PredicateError::MissingPeriod("RSI".to_string()));
    }

    #[test]
    fn test_unknown_suffix_indicator() {
        let err = collect("VWAP14 > 1").unwrap_err();
        assert!(matches!(err, PredicateError::SyntaxError { .. }));
    }

    #[test]
    fn test_macd_with_period_rejected() {
        let err = collect("MACD14 > 0").unwrap_err();
        assert!(matches!(err, PredicateError::SyntaxError { .. }));
    }

    #[test]
    fn test_zero_period_rejected() {
        let err = collect("RSI0 < 30").unwrap_err();
        assert!(matches!(err, PredicateError::SyntaxError { .. }));
    }

    #[test]
    fn test_unknown_function() {
        let err = collect("vwap(close, 20) > 1").unwrap_err();
        assert!(matches!(err, PredicateError::SyntaxError { .. }));
    }

    #[test]
    fn test_call_form_requires_close_argument() {
        let err = collect("sma(open, 20) > 1").unwrap_err();
        assert!(matches!(err, PredicateError::SyntaxError { .. }));
    }

    #[test]
    fn test_numeric_literal_not_scanned_as_period() {
        let refs = collect("CLOSE > 99.5").unwrap();
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_unknown_bare_word_is_left_for_evaluator() {
        let refs = collect("FOO > 1").unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn test_multiple_references_in_order() {
        let refs = collect("RSI14 < 30 && EMA50 > SMA200").unwrap();
        let spellings: Vec<_> = refs.iter().map(|r| r.spelling.as_str()).collect();
        assert_eq!(spellings, vec!["RSI14", "EMA50", "SMA200"]);
    }
}
