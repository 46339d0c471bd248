//! Run-wide trade ledger assembled from per-instrument trades.

use crate::domain::position::ClosedTrade;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub code: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub quantity: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub gain: f64,
    pub term: u32,
}

impl From<&ClosedTrade> for TradeRecord {
    fn from(trade: &ClosedTrade) -> Self {
        Self {
            code: trade.code.clone(),
            entry_date: trade.entry_date,
            exit_date: trade.exit_date,
            quantity: trade.quantity,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            gain: trade.pnl,
            term: trade.term,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TradeRecorder {
    records: Vec<TradeRecord>,
}

impl TradeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one instrument's ledger.
    pub fn concat(&mut self, trades: &[ClosedTrade]) {
        self.records.extend(trades.iter().map(TradeRecord::from));
    }

    /// Records ordered by exit date, then code.
    pub fn records(&self) -> Vec<TradeRecord> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| {
            a.exit_date
                .cmp(&b.exit_date)
                .then_with(|| a.code.cmp(&b.code))
                .then_with(|| a.entry_date.cmp(&b.entry_date))
        });
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Trade log key for a strategy flavour over a run window.
pub fn log_key(prefix: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!("{prefix}_{start}_{end}")
}
