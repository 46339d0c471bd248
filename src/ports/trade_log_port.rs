//! Persisted trade log port.

use crate::domain::error::CombitraderError;
use crate::domain::trade_recorder::TradeRecord;

pub trait TradeLogPort {
    /// Append `records` to the log stored under `key`, creating it if needed.
    fn append(&self, key: &str, records: &[TradeRecord]) -> Result<(), CombitraderError>;
}
