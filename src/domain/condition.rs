//! Condition AST.
//!
//! A [`Condition`] is a pure boolean predicate over a market context:
//! - `Operand`: what can be compared (columns, lags, window aggregates,
//!   constants, account state)
//! - `Leg`: which window a comparison reads (the instrument or a benchmark)
//! - `Condition`: comparison and composite variants
//!
//! Conditions render to a compact text form that
//! [`condition_parser::parse`](crate::domain::condition_parser::parse) reads
//! back, which is also what `describe` shows for audit output.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Leg {
    Daily,
    Index(String),
}

impl Leg {
    pub fn from_tag(tag: &str) -> Self {
        if tag == "daily" {
            Leg::Daily
        } else {
            Leg::Index(tag.to_string())
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Daily => write!(f, "daily"),
            Leg::Index(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

impl CompareOp {
    /// NaN on either side is always false.
    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Gt => left > right,
            CompareOp::Lt => left < right,
            CompareOp::Ge => left >= right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => (left - right).abs() < 1e-9,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Constant(f64),
    Column(String),
    Lagged { column: String, bars: usize },
    Min { column: String, bars: usize },
    Max { column: String, bars: usize },
    Sum { column: String, bars: usize },
    /// Unrealized gain of the open position at the latest close.
    Gain,
    /// Currently held quantity.
    Held,
    WinStreak,
    LoseStreak,
    /// Sum of realized gains so far.
    TradeGain,
}

impl Operand {
    pub fn col(name: &str) -> Self {
        Operand::Column(name.to_string())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Constant(v) => write!(f, "{v}"),
            Operand::Column(c) => write!(f, "{c}"),
            Operand::Lagged { column, bars } => write!(f, "{column}[{bars}]"),
            Operand::Min { column, bars } => write!(f, "MIN({column}, {bars})"),
            Operand::Max { column, bars } => write!(f, "MAX({column}, {bars})"),
            Operand::Sum { column, bars } => write!(f, "SUM({column}, {bars})"),
            Operand::Gain => write!(f, "$gain"),
            Operand::Held => write!(f, "$held"),
            Operand::WinStreak => write!(f, "$win_streak"),
            Operand::LoseStreak => write!(f, "$lose_streak"),
            Operand::TradeGain => write!(f, "$trade_gain"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Always,
    Never,
    Compare {
        leg: Leg,
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn daily(left: Operand, op: CompareOp, right: Operand) -> Self {
        Condition::Compare {
            leg: Leg::Daily,
            left,
            op,
            right,
        }
    }

    pub fn on(leg: Leg, left: Operand, op: CompareOp, right: Operand) -> Self {
        Condition::Compare {
            leg,
            left,
            op,
            right,
        }
    }

    /// `column op value` on the given leg.
    pub fn threshold(leg: &Leg, column: &str, op: CompareOp, value: f64) -> Self {
        Condition::on(
            leg.clone(),
            Operand::col(column),
            op,
            Operand::Constant(value),
        )
    }

    /// `left op right`, both columns on the given leg.
    pub fn columns(leg: &Leg, left: &str, op: CompareOp, right: &str) -> Self {
        Condition::on(leg.clone(), Operand::col(left), op, Operand::col(right))
    }

    /// Names of the benchmark legs this condition reads.
    pub fn index_legs(&self, out: &mut BTreeSet<String>) {
        match self {
            Condition::Compare {
                leg: Leg::Index(name),
                ..
            } => {
                out.insert(name.clone());
            }
            Condition::All(items) | Condition::Any(items) => {
                items.iter().for_each(|c| c.index_legs(out));
            }
            Condition::Not(inner) => inner.index_legs(out),
            _ => {}
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, items: &[Condition]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, c) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{c}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => write!(f, "true"),
            Condition::Never => write!(f, "false"),
            Condition::Compare {
                leg,
                left,
                op,
                right,
            } => {
                if *leg != Leg::Daily {
                    write!(f, "{leg}: ")?;
                }
                write!(f, "{left} {} {right}", op.symbol())
            }
            Condition::All(items) => write_list(f, "ALL", items),
            Condition::Any(items) => write_list(f, "ANY", items),
            Condition::Not(inner) => write!(f, "NOT({inner})"),
        }
    }
}
