//! Per-instrument market series, sliding windows and the unified timeline.
//!
//! A [`Series`] holds the OHLCV bars of one instrument plus any number of
//! named indicator columns supplied by the data loader. Rules never see the
//! whole series: they read a [`SeriesWindow`] that ends at the evaluation
//! date, so a predicate cannot look ahead.

use crate::domain::error::CombitraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct Series {
    pub code: String,
    pub bars: Vec<OhlcvBar>,
    pub columns: HashMap<String, Vec<f64>>,
    date_index: HashMap<NaiveDate, usize>,
}

impl Series {
    pub fn new(code: impl Into<String>, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            code: code.into(),
            bars,
            columns: HashMap::new(),
            date_index,
        }
    }

    /// Attach a named indicator column aligned with the bars.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, CombitraderError> {
        let name = name.into();
        if values.len() != self.bars.len() {
            return Err(CombitraderError::NoData {
                code: self.code.clone(),
                reason: format!(
                    "column {} has {} values for {} bars",
                    name,
                    values.len(),
                    self.bars.len()
                ),
            });
        }
        self.columns.insert(name, values);
        Ok(self)
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Index of the last bar dated on or before `date`.
    pub fn index_at_or_before(&self, date: NaiveDate) -> Option<usize> {
        let after = self.bars.partition_point(|b| b.date <= date);
        after.checked_sub(1)
    }

    /// Window ending at the last bar dated on or before `date`.
    pub fn window(&self, date: NaiveDate) -> Option<SeriesWindow<'_>> {
        self.index_at_or_before(date)
            .map(|end| SeriesWindow { series: self, end })
    }

    /// Value of a price field or indicator column; NaN when absent.
    pub fn value(&self, column: &str, index: usize) -> f64 {
        let Some(bar) = self.bars.get(index) else {
            return f64::NAN;
        };
        if let Some(v) = bar.field(column) {
            return v;
        }
        self.columns
            .get(column)
            .and_then(|values| values.get(index))
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// Dates of all bars within `[start, end]`.
    pub fn dates(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        self.bars
            .iter()
            .map(|b| b.date)
            .filter(|d| *d >= start && *d <= end)
            .collect()
    }

    /// Last bar within `[start, end]`.
    pub fn last_in_range(&self, start: NaiveDate, end: NaiveDate) -> Option<&OhlcvBar> {
        self.bars
            .iter()
            .rev()
            .find(|b| b.date >= start && b.date <= end)
    }

    /// Bars within `[start, end]`.
    pub fn split(&self, start: NaiveDate, end: NaiveDate) -> &[OhlcvBar] {
        let from = self.bars.partition_point(|b| b.date < start);
        let to = self.bars.partition_point(|b| b.date <= end);
        &self.bars[from..to.max(from)]
    }
}

/// Read-only view of a series up to and including one bar.
#[derive(Debug, Clone, Copy)]
pub struct SeriesWindow<'a> {
    series: &'a Series,
    end: usize,
}

impl<'a> SeriesWindow<'a> {
    pub fn code(&self) -> &'a str {
        &self.series.code
    }

    /// Number of bars visible through the window.
    pub fn len(&self) -> usize {
        self.end + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn bar(&self) -> &'a OhlcvBar {
        &self.series.bars[self.end]
    }

    pub fn date(&self) -> NaiveDate {
        self.bar().date
    }

    /// Value `back` bars before the window end (0 = latest).
    pub fn value(&self, column: &str, back: usize) -> f64 {
        match self.end.checked_sub(back) {
            Some(i) => self.series.value(column, i),
            None => f64::NAN,
        }
    }

    pub fn latest(&self, column: &str) -> f64 {
        self.value(column, 0)
    }

    /// The last `n` values, oldest first; `None` if fewer are visible.
    pub fn tail(&self, column: &str, n: usize) -> Option<Vec<f64>> {
        if n == 0 || n > self.len() {
            return None;
        }
        Some(
            (self.end + 1 - n..=self.end)
                .map(|i| self.series.value(column, i))
                .collect(),
        )
    }

    pub fn min(&self, column: &str, n: usize) -> f64 {
        self.tail(column, n)
            .map(|v| v.into_iter().fold(f64::INFINITY, f64::min))
            .unwrap_or(f64::NAN)
    }

    pub fn max(&self, column: &str, n: usize) -> f64 {
        self.tail(column, n)
            .map(|v| v.into_iter().fold(f64::NEG_INFINITY, f64::max))
            .unwrap_or(f64::NAN)
    }

    pub fn sum(&self, column: &str, n: usize) -> f64 {
        self.tail(column, n)
            .map(|v| v.into_iter().sum())
            .unwrap_or(f64::NAN)
    }
}

/// Everything loaded for one run: tradable instruments and benchmark series.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub stocks: BTreeMap<String, Series>,
    pub index: BTreeMap<String, Series>,
}

impl MarketData {
    pub fn with_stock(mut self, series: Series) -> Self {
        self.stocks.insert(series.code.clone(), series);
        self
    }

    pub fn with_index(mut self, name: impl Into<String>, series: Series) -> Self {
        self.index.insert(name.into(), series);
        self
    }

    /// Benchmark windows as of `date`, keyed by leg name.
    pub fn index_windows(&self, date: NaiveDate) -> BTreeMap<&str, SeriesWindow<'_>> {
        self.index
            .iter()
            .filter_map(|(name, s)| s.window(date).map(|w| (name.as_str(), w)))
            .collect()
    }
}

/// Sorted union of bar dates within `[start, end]` across the given series.
pub fn build_unified_timeline<'a>(
    series: impl IntoIterator<Item = &'a Series>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    let unique: BTreeSet<NaiveDate> = series
        .into_iter()
        .flat_map(|s| s.dates(start, end))
        .collect();
    unique.into_iter().collect()
}
