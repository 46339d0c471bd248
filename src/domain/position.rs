//! Open position on one instrument and its closed trades.

use crate::domain::context::{Direction, PositionView};
use chrono::NaiveDate;

/// Position built from one or more lots at the close.
///
/// `cost` is the capital committed at entry for either direction; a short
/// position gains what a long one would lose.
#[derive(Debug, Clone, Default)]
pub struct Position {
    pub direction: Direction,
    pub quantity: u64,
    /// Total cost of the units held.
    pub cost: f64,
    pub entry_date: Option<NaiveDate>,
    pub term: u32,
    /// Largest quantity held since the position opened.
    pub peak_quantity: u64,
}

impl Position {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.quantity > 0
    }

    /// Average entry price per unit; zero when flat.
    pub fn average_price(&self) -> f64 {
        if self.quantity == 0 {
            0.0
        } else {
            self.cost / self.quantity as f64
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * (self.market_value(price) - self.cost)
    }

    /// What closing at `price` returns to the account.
    pub fn liquidation_value(&self, price: f64) -> f64 {
        self.cost + self.unrealized_pnl(price)
    }

    pub fn add(&mut self, date: NaiveDate, quantity: u64, price: f64) {
        if self.quantity == 0 {
            self.entry_date = Some(date);
            self.term = 0;
            self.peak_quantity = 0;
        }
        self.quantity += quantity;
        self.cost += quantity as f64 * price;
        self.peak_quantity = self.peak_quantity.max(self.quantity);
    }

    /// Sell everything at `price`, returning the closed trade.
    pub fn close(&mut self, code: &str, date: NaiveDate, price: f64) -> Option<ClosedTrade> {
        if self.quantity == 0 {
            return None;
        }
        let trade = ClosedTrade {
            code: code.to_string(),
            quantity: self.peak_quantity,
            entry_price: self.average_price(),
            exit_price: price,
            entry_date: self.entry_date.unwrap_or(date),
            exit_date: date,
            term: self.term,
            pnl: self.unrealized_pnl(price),
        };
        *self = Position::new(self.direction);
        Some(trade)
    }

    pub fn view(&self) -> PositionView {
        PositionView {
            held: self.quantity,
            value: self.average_price(),
            term: self.term,
            direction: self.direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub code: String,
    /// Peak quantity held over the trade.
    pub quantity: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub term: u32,
    pub pnl: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
