//! Boolean expression parser/evaluator.
//!
//! Recursive descent over the rewritten predicate text: numeric literals,
//! identifiers bound in a parameter map, comparison operators, `&&`,
//! `||`, `!` and parentheses. Produces position-carrying errors so the
//! dispatcher can tell the user which part of the predicate is wrong.

use std::collections::BTreeMap;

/// Evaluation failure, before mapping to the public error taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Syntax { position: usize, message: String },
    UnknownIdentifier { position: usize, name: String },
    /// Logical/comparison typing failure (non-boolean result, boolean
    /// operand to a numeric comparison, and so on).
    NonBoolean,
    /// Comparison where either side is NaN.
    NanComparison,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Syntax { position, message } => {
                write!(f, "{} at position {}", message, position)
            }
            EvalError::UnknownIdentifier { position, name } => {
                write!(f, "unknown identifier '{}' at position {}", name, position)
            }
            EvalError::NonBoolean => write!(f, "expression is not boolean"),
            EvalError::NanComparison => write!(f, "comparison against NaN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Num(f64),
    Bool(bool),
}

/// Evaluate a predicate to a boolean against the given parameter map.
pub fn eval_bool(input: &str, params: &BTreeMap<String, f64>) -> Result<bool, EvalError> {
    let mut parser = Parser {
        input,
        pos: 0,
        params,
    };

    let value = parser.parse_or()?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(EvalError::Syntax {
            position: parser.pos,
            message: format!("unexpected input after expression: '{}'", parser.remaining()),
        });
    }

    match value {
        Value::Bool(b) => Ok(b),
        Value::Num(_) => Err(EvalError::NonBoolean),
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    params: &'a BTreeMap<String, f64>,
}

impl<'a> Parser<'a> {
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

    fn consume_op(&mut self, op: &str) -> bool {
        if self.remaining().starts_with(op) {
            self.pos += op.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Value, EvalError> {
        let mut left = self.parse_and()?;

        loop {
            self.skip_whitespace();
            if !self.consume_op("||") {
                break;
            }
            let right = self.parse_and()?;
            left = match (left, right) {
                (Value::Bool(a), Value::Bool(b)) => Value::Bool(a || b),
                _ => return Err(EvalError::NonBoolean),
            };
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Value, EvalError> {
        let mut left = self.parse_unary()?;

        loop {
            self.skip_whitespace();
            if !self.consume_op("&&") {
                break;
            }
            let right = self.parse_unary()?;
            left = match (left, right) {
                (Value::Bool(a), Value::Bool(b)) => Value::Bool(a && b),
                _ => return Err(EvalError::NonBoolean),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Value, EvalError> {
        self.skip_whitespace();

        // '!' negation, but not the first half of '!='.
        if self.peek() == Some('!') && !self.remaining().starts_with("!=") {
            self.advance();
            return match self.parse_unary()? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Num(_) => Err(EvalError::NonBoolean),
            };
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Value, EvalError> {
        let left = self.parse_primary()?;

        self.skip_whitespace();
        let op = if self.consume_op("<=") {
            "<="
        } else if self.consume_op(">=") {
            ">="
        } else if self.consume_op("==") {
            "=="
        } else if self.consume_op("!=") {
            "!="
        } else if self.consume_op("<") {
            "<"
        } else if self.consume_op(">") {
            ">"
        } else {
            return Ok(left);
        };

        let right = self.parse_primary()?;

        match (left, right) {
            (Value::Num(a), Value::Num(b)) => {
                if a.is_nan() || b.is_nan() {
                    return Err(EvalError::NanComparison);
                }
                let result = match op {
                    "<" => a < b,
                    ">" => a > b,
                    "<=" => a <= b,
                    ">=" => a >= b,
                    "==" => a == b,
                    "!=" => a != b,
                    _ => unreachable!(),
                };
                Ok(Value::Bool(result))
            }
            // Equality between two already-boolean subexpressions.
            (Value::Bool(a), Value::Bool(b)) if op == "==" => Ok(Value::Bool(a == b)),
            (Value::Bool(a), Value::Bool(b)) if op == "!=" => Ok(Value::Bool(a != b)),
            _ => Err(EvalError::NonBoolean),
        }
    }

    fn parse_primary(&mut self) -> Result<Value, EvalError> {
        self.skip_whitespace();

        match self.peek() {
            Some('(') => {
                self.advance();
                let value = self.parse_or()?;
                self.skip_whitespace();
                if self.peek() == Some(')') {
                    self.advance();
                    Ok(value)
                } else {
                    Err(EvalError::Syntax {
                        position: self.pos,
                        message: "expected ')'".to_string(),
                    })
                }
            }
            Some('-') => {
                self.advance();
                match self.parse_primary()? {
                    Value::Num(n) => Ok(Value::Num(-n)),
                    Value::Bool(_) => Err(EvalError::NonBoolean),
                }
            }
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.parse_number(),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => self.parse_identifier(),
            Some(ch) => Err(EvalError::Syntax {
                position: self.pos,
                message: format!("unexpected character '{}'", ch),
            }),
            None => Err(EvalError::Syntax {
                position: self.pos,
                message: "unexpected end of input".to_string(),
            }),
        }
    }

    fn parse_number(&mut self) -> Result<Value, EvalError> {
        let start = self.pos;
        let mut has_dot = false;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Value::Num)
            .map_err(|_| EvalError::Syntax {
                position: start,
                message: format!("invalid number: {}", text),
            })
    }

    fn parse_identifier(&mut self) -> Result<Value, EvalError> {
        let start = self.pos;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let name = &self.input[start..self.pos];
        self.params
            .get(name)
            .copied()
            .map(Value::Num)
            .ok_or_else(|| EvalError::UnknownIdentifier {
                position: start,
                name: name.to_string(),
            })
    }
}
