//! Condition text parser.
//!
//! Recursive descent over the form produced by `Condition`'s `Display`:
//!
//! ```text
//! condition  := "true" | "false"
//!             | "ALL(" [condition ("," condition)*] ")"
//!             | "ANY(" [condition ("," condition)*] ")"
//!             | "NOT(" condition ")"
//!             | [leg ":"] operand op operand
//! operand    := number | "$" name | ("MIN" | "MAX" | "SUM") "(" column "," int ")"
//!             | column ["[" int "]"]
//! op         := ">=" | "<=" | "==" | ">" | "<"
//! ```
//!
//! Errors carry the byte offset of the offending token.

use crate::domain::condition::{CompareOp, Condition, Leg, Operand};
use crate::domain::error::ParseError;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

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
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn found(&self) -> String {
        let word = self.peek_word();
        if !word.is_empty() {
            return word.to_string();
        }
        self.peek()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error(format!("expected '{}', found '{}'", expected, self.found()))),
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn peek_word(&self) -> &'a str {
        let rest = self.remaining();
        let end = rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..end]
    }

    fn parse_name(&mut self, what: &str) -> Result<String, ParseError> {
        self.skip_whitespace();
        let word = self.peek_word();
        if word.is_empty() || word.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error(format!("expected {}, found '{}'", what, self.found())));
        }
        self.pos += word.len();
        Ok(word.to_string())
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let text = &self.input[start..self.pos];
        text.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {text}"),
            position: start,
        })
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if start == self.pos {
            return Err(ParseError {
                message: "expected integer".to_string(),
                position: start,
            });
        }
        let text = &self.input[start..self.pos];
        text.parse::<usize>().map_err(|_| ParseError {
            message: format!("invalid integer: {text}"),
            position: start,
        })
    }

    fn parse_aggregate(&mut self) -> Result<(String, usize), ParseError> {
        let column = self.parse_name("column")?;
        self.expect_char(',')?;
        let bars = self.parse_integer()?;
        if bars == 0 {
            return Err(self.error("window length must be at least 1"));
        }
        self.expect_char(')')?;
        Ok((column, bars))
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '.')
        {
            return Ok(Operand::Constant(self.parse_number()?));
        }

        if self.peek() == Some('$') {
            let start = self.pos;
            self.advance();
            let name = self.parse_name("account value")?;
            return match name.as_str() {
                "gain" => Ok(Operand::Gain),
                "held" => Ok(Operand::Held),
                "win_streak" => Ok(Operand::WinStreak),
                "lose_streak" => Ok(Operand::LoseStreak),
                "trade_gain" => Ok(Operand::TradeGain),
                other => Err(ParseError {
                    message: format!("unknown account value '${other}'"),
                    position: start,
                }),
            };
        }

        if self.consume_exact("MIN(") {
            let (column, bars) = self.parse_aggregate()?;
            return Ok(Operand::Min { column, bars });
        }
        if self.consume_exact("MAX(") {
            let (column, bars) = self.parse_aggregate()?;
            return Ok(Operand::Max { column, bars });
        }
        if self.consume_exact("SUM(") {
            let (column, bars) = self.parse_aggregate()?;
            return Ok(Operand::Sum { column, bars });
        }

        let column = self.parse_name("operand")?;
        if self.peek() == Some('[') {
            self.advance();
            let bars = self.parse_integer()?;
            self.expect_char(']')?;
            return Ok(Operand::Lagged { column, bars });
        }
        Ok(Operand::Column(column))
    }

    fn parse_op(&mut self) -> Result<CompareOp, ParseError> {
        self.skip_whitespace();
        for (text, op) in [
            (">=", CompareOp::Ge),
            ("<=", CompareOp::Le),
            ("==", CompareOp::Eq),
            (">", CompareOp::Gt),
            ("<", CompareOp::Lt),
        ] {
            if self.consume_exact(text) {
                return Ok(op);
            }
        }
        Err(self.error(format!("expected comparison operator, found '{}'", self.found())))
    }

    /// A leading `name:` selects the window the comparison reads.
    fn parse_leg(&mut self) -> Leg {
        self.skip_whitespace();
        let word = self.peek_word();
        if word.is_empty() || word.starts_with(|c: char| c.is_ascii_digit()) {
            return Leg::Daily;
        }
        let after = self.input[self.pos + word.len()..].trim_start();
        if after.starts_with(':') {
            let colon = self.input.len() - after.len();
            self.pos = colon + 1;
            Leg::from_tag(word)
        } else {
            Leg::Daily
        }
    }

    fn parse_comparison(&mut self) -> Result<Condition, ParseError> {
        let leg = self.parse_leg();
        let left = self.parse_operand()?;
        let op = self.parse_op()?;
        let right = self.parse_operand()?;
        Ok(Condition::on(leg, left, op, right))
    }

    fn parse_list(&mut self) -> Result<Vec<Condition>, ParseError> {
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
            return Ok(items);
        }
        items.push(self.parse_condition()?);
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                return Ok(items);
            }
            self.expect_char(',')?;
            items.push(self.parse_condition()?);
        }
    }

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        self.skip_whitespace();
        if self.remaining().is_empty() {
            return Err(self.error("expected condition, found end of input"));
        }

        if self.consume_exact("ALL(") {
            return Ok(Condition::All(self.parse_list()?));
        }
        if self.consume_exact("ANY(") {
            return Ok(Condition::Any(self.parse_list()?));
        }
        if self.consume_exact("NOT(") {
            let inner = self.parse_condition()?;
            self.expect_char(')')?;
            return Ok(Condition::Not(Box::new(inner)));
        }

        match self.peek_word() {
            "true" => {
                self.pos += 4;
                Ok(Condition::Always)
            }
            "false" => {
                self.pos += 5;
                Ok(Condition::Never)
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse(&mut self) -> Result<Condition, ParseError> {
        let condition = self.parse_condition()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after condition: '{}'",
                self.remaining()
            )));
        }
        Ok(condition)
    }
}

pub fn parse(input: &str) -> Result<Condition, ParseError> {
    Parser::new(input).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_column_comparison() {
        let c = parse("daily_average > close").unwrap();
        assert_eq!(
            c,
            Condition::daily(
                Operand::col("daily_average"),
                CompareOp::Gt,
                Operand::col("close")
            )
        );
    }

    #[test]
    fn parse_leg_prefix() {
        let c = parse("nikkei: macd <= 0").unwrap();
        assert_eq!(
            c,
            Condition::on(
                Leg::Index("nikkei".into()),
                Operand::col("macd"),
                CompareOp::Le,
                Operand::Constant(0.0)
            )
        );
        let d = parse("daily : close == 1").unwrap();
        assert!(matches!(d, Condition::Compare { leg: Leg::Daily, .. }));
    }

    #[test]
    fn parse_operands() {
        let c = parse("MIN(score, 5) >= score[1]").unwrap();
        assert_eq!(
            c,
            Condition::daily(
                Operand::Min {
                    column: "score".into(),
                    bars: 5
                },
                CompareOp::Ge,
                Operand::Lagged {
                    column: "score".into(),
                    bars: 1
                }
            )
        );
        assert!(parse("SUM(high_update, 10) <= 5").is_ok());
        assert!(parse("MAX(high_update, 2) == 0").is_ok());
    }

    #[test]
    fn parse_account_values() {
        assert_eq!(
            parse("$gain < -0.02").unwrap(),
            Condition::daily(Operand::Gain, CompareOp::Lt, Operand::Constant(-0.02))
        );
        for name in ["$held", "$win_streak", "$lose_streak", "$trade_gain"] {
            assert!(parse(&format!("{name} > 0")).is_ok(), "{name}");
        }
    }

    #[test]
    fn parse_composites() {
        let c = parse("ANY(ALL(true, false), NOT($held >= 100), ALL())").unwrap();
        match c {
            Condition::Any(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], Condition::All(vec![Condition::Always, Condition::Never]));
                assert!(matches!(items[1], Condition::Not(_)));
                assert_eq!(items[2], Condition::All(vec![]));
            }
            other => panic!("expected Any, got {other:?}"),
        }
    }

    #[test]
    fn display_then_parse_is_identity() {
        let cases = [
            "daily_average > close",
            "nikkei: rci_12 < -80",
            "ALL(new_score: score > -400, stop_low == 0)",
            "ANY(ALL(MAX(high_update, 2) == 0, $gain <= 0), SUM(high_update, 10) <= 5)",
            "NOT(close[3] >= 12.5)",
            "true",
        ];
        for text in cases {
            let parsed = parse(text).unwrap();
            assert_eq!(parsed.to_string(), text);
            assert_eq!(parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn error_unknown_account_value() {
        let err = parse("$equity > 0").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("$equity"));
    }

    #[test]
    fn error_missing_operator() {
        let err = parse("close  daily_average").unwrap_err();
        assert_eq!(err.position, 7);
        assert!(err.message.contains("comparison operator"));
    }

    #[test]
    fn error_missing_paren() {
        assert!(parse("NOT(close > 1").is_err());
        assert!(parse("ALL(true, false").is_err());
    }

    #[test]
    fn error_zero_window() {
        assert!(parse("SUM(volume, 0) > 1").is_err());
    }

    #[test]
    fn error_trailing_input() {
        let err = parse("true false").unwrap_err();
        assert_eq!(err.position, 5);
    }

    #[test]
    fn error_empty_input() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }
}
