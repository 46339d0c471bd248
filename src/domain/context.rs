//! Per-day evaluation context handed to conditions and the rule engine.

use crate::domain::condition::Leg;
use crate::domain::series::SeriesWindow;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Trailing drawdown samples kept for the entry throttle.
pub const DRAWDOWN_WINDOW: usize = 20;

/// Trade direction of a strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short: the sign of gain per unit price rise.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

/// Read-only snapshot of the open position on one instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionView {
    pub held: u64,
    /// Average entry price per unit.
    pub value: f64,
    /// Bars since the position was opened.
    pub term: u32,
    pub direction: Direction,
}

impl PositionView {
    /// Unrealized gain at `price`; zero when flat.
    pub fn gain(&self, price: f64) -> f64 {
        if self.held == 0 {
            return 0.0;
        }
        self.direction.sign() * (price - self.value) * self.held as f64
    }

    /// Return of `price` against the entry price; zero when flat.
    pub fn return_rate(&self, price: f64) -> f64 {
        if self.held == 0 || self.value <= 0.0 {
            return 0.0;
        }
        self.direction.sign() * (price - self.value) / self.value
    }
}

/// Account memory derived by the execution side after each day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskState {
    /// Trailing drawdown samples, oldest first, at most [`DRAWDOWN_WINDOW`].
    pub drawdowns: Vec<f64>,
    pub win_streak: u32,
    pub lose_streak: u32,
    /// Sum of realized trade gains.
    pub trade_gain: f64,
}

#[derive(Debug, Clone)]
pub struct Context<'a> {
    pub date: NaiveDate,
    pub daily: SeriesWindow<'a>,
    pub index: &'a BTreeMap<&'a str, SeriesWindow<'a>>,
    pub position: PositionView,
    pub risk: RiskState,
    /// Current account equity.
    pub equity: f64,
}

impl<'a> Context<'a> {
    /// Latest close of the instrument.
    pub fn price(&self) -> f64 {
        self.daily.latest("close")
    }

    pub fn gain(&self) -> f64 {
        self.position.gain(self.price())
    }

    pub fn window(&self, leg: &Leg) -> Option<SeriesWindow<'a>> {
        match leg {
            Leg::Daily => Some(self.daily),
            Leg::Index(name) => self.index.get(name.as_str()).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_position_has_no_gain() {
        let p = PositionView::default();
        assert_eq!(p.gain(120.0), 0.0);
        assert_eq!(p.return_rate(120.0), 0.0);
    }

    #[test]
    fn gain_and_rate_follow_entry_price() {
        let p = PositionView {
            held: 200,
            value: 100.0,
            term: 3,
            direction: Direction::Long,
        };
        assert_eq!(p.gain(97.0), -600.0);
        assert!((p.return_rate(97.0) + 0.03).abs() < 1e-12);
    }

    #[test]
    fn short_gains_when_price_falls() {
        let p = PositionView {
            held: 200,
            value: 100.0,
            term: 3,
            direction: Direction::Short,
        };
        assert_eq!(p.gain(97.0), 600.0);
        assert!((p.return_rate(97.0) - 0.03).abs() < 1e-12);
        assert!(p.return_rate(103.0) < 0.0);
    }
}
