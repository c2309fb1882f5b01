//! Slash-command grammar.
//!
//! Tokenizes a command line with double-quoted predicate support and
//! validates every argument before anything touches the engine. Errors
//! are user-readable strings emitted as error frames by the dispatcher.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::types::{Interval, OrderAction, Product};

/// Hard cap on monitor validity, in days.
pub const MAX_VALIDITY_DAYS: i64 = 30;

const DEFAULT_EXCHANGE: &str = "NSE";

/// How long a monitor stays armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Practically unbounded; the expiry timer still caps each worker
    /// run at 30 days.
    Forever,
    Until(Duration),
}

impl Validity {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Validity::Forever => Utc
                .with_ymd_and_hms(9999, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Validity::Until(d) => now + *d,
        }
    }
}

/// A parsed, validated slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Price {
        symbol: String,
        exchange: String,
    },
    Signal {
        symbol: String,
        interval: Interval,
        predicate: String,
        exchange: String,
    },
    SmartOrder {
        action: OrderAction,
        symbol: String,
        quantity: u32,
        exchange: String,
        product: Product,
    },
    SmartAuto {
        action: OrderAction,
        symbol: String,
        quantity: u32,
        exchange: String,
        product: Product,
        interval: Interval,
        validity: Validity,
        predicate: String,
    },
    StatusOrders,
    CancelOrder {
        id: String,
    },
    CancelAllOrders,
    Help,
}

/// Split a command line into tokens, honoring double quotes.
fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                if in_quotes {
                    tokens.push(current.clone());
                    current.clear();
                }
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(current.clone());
                    current.clear();
                }
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err("unbalanced quote in command".to_string());
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    Ok(tokens)
}

fn parse_quantity(token: &str) -> Result<u32, String> {
    match token.parse::<u32>() {
        Ok(q) if q > 0 => Ok(q),
        _ => Err(format!("quantity must be a positive integer, got '{}'", token)),
    }
}

fn parse_interval(token: &str) -> Result<Interval, String> {
    Interval::parse(token)
        .ok_or_else(|| format!("interval must be one of 5m, 15m, 1h, got '{}'", token))
}

fn parse_product(token: &str) -> Result<Product, String> {
    Product::parse(token)
        .ok_or_else(|| format!("product must be one of MIS, NRML, CNC, got '{}'", token))
}

fn normalize_exchange(token: Option<&String>) -> String {
    token
        .map(|t| t.to_ascii_uppercase())
        .unwrap_or_else(|| DEFAULT_EXCHANGE.to_string())
}

/// Parse the validity grammar: `forever` or `<n>{s|m|h|d}` capped at 30 d.
pub fn parse_validity(token: &str) -> Result<Validity, String> {
    if token.eq_ignore_ascii_case("forever") {
        return Ok(Validity::Forever);
    }

    let (digits, unit) = token.split_at(token.len().saturating_sub(1));
    let n: i64 = digits
        .parse()
        .map_err(|_| format!("validity must be 'forever' or <n>s/m/h/d, got '{}'", token))?;
    if n <= 0 {
        return Err(format!("validity must be positive, got '{}'", token));
    }

    let duration = match unit {
        "s" => Duration::seconds(n),
        "m" => Duration::minutes(n),
        "h" => Duration::hours(n),
        "d" => Duration::days(n),
        _ => {
            return Err(format!(
                "validity must be 'forever' or <n>s/m/h/d, got '{}'",
                token
            ))
        }
    };

    if duration > Duration::days(MAX_VALIDITY_DAYS) {
        return Err(format!(
            "validity is capped at 30d, got '{}' (use 'forever' for a rolling monitor)",
            token
        ));
    }

    Ok(Validity::Until(duration))
}

/// Parse a slash command line (leading `/` included).
pub fn parse(input: &str) -> Result<Command, String> {
    let tokens = tokenize(input.trim())?;
    let Some(head) = tokens.first() else {
        return Err("empty command".to_string());
    };

    match head.as_str() {
        "/price" => {
            let symbol = tokens
                .get(1)
                .ok_or("usage: /price <SYMBOL> [EXCHANGE]")?
                .to_ascii_uppercase();
            Ok(Command::Price {
                symbol,
                exchange: normalize_exchange(tokens.get(2)),
            })
        }

        "/signal" => {
            if tokens.len() < 4 {
                return Err("usage: /signal <SYMBOL> <INTERVAL> \"<PREDICATE>\" [EXCHANGE]"
                    .to_string());
            }
            Ok(Command::Signal {
                symbol: tokens[1].to_ascii_uppercase(),
                interval: parse_interval(&tokens[2])?,
                predicate: tokens[3].clone(),
                exchange: normalize_exchange(tokens.get(4)),
            })
        }

        "/buy_smart" | "/sell_smart" => {
            let action = if head == "/buy_smart" {
                OrderAction::Buy
            } else {
                OrderAction::Sell
            };
            if tokens.len() < 3 {
                return Err(format!(
                    "usage: {} <SYMBOL> <QTY> [EXCHANGE] [PRODUCT]",
                    head
                ));
            }
            let product = match tokens.get(4) {
                Some(t) => parse_product(t)?,
                None => Product::Mis,
            };
            Ok(Command::SmartOrder {
                action,
                symbol: tokens[1].to_ascii_uppercase(),
                quantity: parse_quantity(&tokens[2])?,
                exchange: normalize_exchange(tokens.get(3)),
                product,
            })
        }

        "/buy_smart_auto" | "/sell_smart_auto" => {
            let action = if head == "/buy_smart_auto" {
                OrderAction::Buy
            } else {
                OrderAction::Sell
            };
            if tokens.len() < 8 {
                return Err(format!(
                    "usage: {} <SYMBOL> <QTY> <EXCHANGE> <PRODUCT> <INTERVAL> <VALIDITY> \"<PREDICATE>\"",
                    head
                ));
            }
            Ok(Command::SmartAuto {
                action,
                symbol: tokens[1].to_ascii_uppercase(),
                quantity: parse_quantity(&tokens[2])?,
                exchange: tokens[3].to_ascii_uppercase(),
                product: parse_product(&tokens[4])?,
                interval: parse_interval(&tokens[5])?,
                validity: parse_validity(&tokens[6])?,
                predicate: tokens[7].clone(),
            })
        }

        "/status_orders" => Ok(Command::StatusOrders),

        "/cancel_order" => {
            let id = tokens
                .get(1)
                .ok_or("usage: /cancel_order <ID>")?
                .to_string();
            Ok(Command::CancelOrder { id })
        }

        "/cancel_all_orders" => Ok(Command::CancelAllOrders),

        "/help" => Ok(Command::Help),

        other => Err(format!(
            "unknown command '{}'; type /help for the command list",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_with_quotes() {
        let tokens = tokenize(r#"/signal RELIANCE 5m "RSI14 < 30" NSE"#).unwrap();
        assert_eq!(
            tokens,
            vec!["/signal", "RELIANCE", "5m", "RSI14 < 30", "NSE"]
        );
    }

    #[test]
    fn test_tokenize_unbalanced_quote() {
        assert!(tokenize(r#"/signal X 5m "RSI14 < 30"#).is_err());
    }

    #[test]
    fn test_parse_price_defaults_exchange() {
        let cmd = parse("/price reliance").unwrap();
        assert_eq!(
            cmd,
            Command::Price {
                symbol: "RELIANCE".to_string(),
                exchange: "NSE".to_string()
            }
        );
    }

    #[test]
    fn test_parse_price_uppercases_exchange() {
        let cmd = parse("/price TCS bse").unwrap();
        assert_eq!(
            cmd,
            Command::Price {
                symbol: "TCS".to_string(),
                exchange: "BSE".to_string()
            }
        );
    }

    #[test]
    fn test_parse_signal() {
        let cmd = parse(r#"/signal RELIANCE 5m "RSI14 < 30" NSE"#).unwrap();
        match cmd {
            Command::Signal {
                symbol,
                interval,
                predicate,
                exchange,
            } => {
                assert_eq!(symbol, "RELIANCE");
                assert_eq!(interval, Interval::FiveMinute);
                assert_eq!(predicate, "RSI14 < 30");
                assert_eq!(exchange, "NSE");
            }
            other => panic!("expected Signal, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_buy_smart_auto() {
        let cmd = parse(r#"/buy_smart_auto TCS 10 NSE NRML 5m 2h "RSI14 < 30""#).unwrap();
        match cmd {
            Command::SmartAuto {
                action,
                symbol,
                quantity,
                exchange,
                product,
                interval,
                validity,
                predicate,
            } => {
                assert_eq!(action, OrderAction::Buy);
                assert_eq!(symbol, "TCS");
                assert_eq!(quantity, 10);
                assert_eq!(exchange, "NSE");
                assert_eq!(product, Product::Nrml);
                assert_eq!(interval, Interval::FiveMinute);
                assert_eq!(validity, Validity::Until(Duration::hours(2)));
                assert_eq!(predicate, "RSI14 < 30");
            }
            other => panic!("expected SmartAuto, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_sell_smart_auto_action() {
        let cmd = parse(r#"/sell_smart_auto INFY 1 NSE MIS 15m 30s "CLOSE > 9999999""#).unwrap();
        assert!(matches!(
            cmd,
            Command::SmartAuto {
                action: OrderAction::Sell,
                ..
            }
        ));
    }

    #[test]
    fn test_auto_rejects_bad_interval() {
        let err = parse(r#"/buy_smart_auto TCS 10 NSE NRML 2m 2h "RSI14 < 30""#).unwrap_err();
        assert!(err.contains("interval"));
    }

    #[test]
    fn test_auto_rejects_zero_quantity() {
        let err = parse(r#"/buy_smart_auto TCS 0 NSE NRML 5m 2h "RSI14 < 30""#).unwrap_err();
        assert!(err.contains("quantity"));
    }

    #[test]
    fn test_auto_rejects_bad_product() {
        let err = parse(r#"/buy_smart_auto TCS 10 NSE BO 5m 2h "RSI14 < 30""#).unwrap_err();
        assert!(err.contains("product"));
    }

    #[test]
    fn test_validity_grammar() {
        assert_eq!(parse_validity("forever").unwrap(), Validity::Forever);
        assert_eq!(parse_validity("FOREVER").unwrap(), Validity::Forever);
        assert_eq!(
            parse_validity("30s").unwrap(),
            Validity::Until(Duration::seconds(30))
        );
        assert_eq!(
            parse_validity("2h").unwrap(),
            Validity::Until(Duration::hours(2))
        );
        assert_eq!(
            parse_validity("30d").unwrap(),
            Validity::Until(Duration::days(30))
        );
    }

    #[test]
    fn test_validity_rejects_over_cap() {
        assert!(parse_validity("31d").is_err());
        assert!(parse_validity("721h").is_err());
    }

    #[test]
    fn test_validity_rejects_garbage() {
        assert!(parse_validity("2w").is_err());
        assert!(parse_validity("h").is_err());
        assert!(parse_validity("-5m").is_err());
        assert!(parse_validity("").is_err());
    }

    #[test]
    fn test_validity_forever_expiry_is_far_future() {
        let expires = Validity::Forever.expires_at(Utc::now());
        assert_eq!(expires.format("%Y").to_string(), "9999");
    }

    #[test]
    fn test_parse_cancel_order() {
        assert_eq!(
            parse("/cancel_order AO-1234abcd").unwrap(),
            Command::CancelOrder {
                id: "AO-1234abcd".to_string()
            }
        );
    }

    #[test]
    fn test_parse_bare_commands() {
        assert_eq!(parse("/status_orders").unwrap(), Command::StatusOrders);
        assert_eq!(parse("/cancel_all_orders").unwrap(), Command::CancelAllOrders);
        assert_eq!(parse("/help").unwrap(), Command::Help);
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse("/portfolio").unwrap_err().contains("unknown command"));
    }
}
