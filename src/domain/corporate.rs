//! Corporate-event disqualification (mergers, acquisitions and the like).

use crate::domain::series::Series;
use chrono::NaiveDate;

/// Column carrying a nonzero flag on bars affected by a corporate event.
pub const EVENT_COLUMN: &str = "corporate_event";

pub trait CorporateEventCheck {
    /// Whether an event touched `series` within `[start, end]`.
    fn occurred(&self, series: &Series, start: NaiveDate, end: NaiveDate) -> bool;
}

/// Reads an event flag column supplied with the market data.
#[derive(Debug, Clone)]
pub struct ColumnFlag {
    column: String,
}

impl ColumnFlag {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Default for ColumnFlag {
    fn default() -> Self {
        Self::new(EVENT_COLUMN)
    }
}

impl CorporateEventCheck for ColumnFlag {
    fn occurred(&self, series: &Series, start: NaiveDate, end: NaiveDate) -> bool {
        let Some(values) = series.columns.get(&self.column) else {
            return false;
        };
        series
            .bars
            .iter()
            .zip(values)
            .any(|(bar, &flag)| bar.date >= start && bar.date <= end && flag > 0.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl CorporateEventCheck for NoEvents {
    fn occurred(&self, _series: &Series, _start: NaiveDate, _end: NaiveDate) -> bool {
        false
    }
}
