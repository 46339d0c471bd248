#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use combitrader::domain::condition::Condition;
use combitrader::domain::error::CombitraderError;
pub use combitrader::domain::ohlcv::OhlcvBar;
use combitrader::domain::rule_engine::SAFETY_COLUMN;
use combitrader::domain::series::Series;
use combitrader::domain::strategy::{RuleGroup, Strategy, StructuralConditions};
use combitrader::domain::trade_recorder::TradeRecord;
use combitrader::ports::data_port::DataPort;
use combitrader::ports::trade_log_port::TradeLogPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::process::ExitCode;

pub struct MockDataPort {
    pub data: HashMap<String, Series>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.data.insert(series.code.clone(), series);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_series(&self, code: &str, _end: NaiveDate) -> Result<Series, CombitraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(CombitraderError::NoData {
                code: code.to_string(),
                reason: reason.clone(),
            });
        }
        self.data
            .get(code)
            .cloned()
            .ok_or_else(|| CombitraderError::NoData {
                code: code.to_string(),
                reason: "unknown code".into(),
            })
    }

    fn list_codes(&self) -> Result<Vec<String>, CombitraderError> {
        let mut codes: Vec<String> = self.data.keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }
}

/// Appends land in memory, keyed as written.
#[derive(Default)]
pub struct RecordingTradeLog {
    pub appends: RefCell<Vec<(String, Vec<TradeRecord>)>>,
}

impl TradeLogPort for RecordingTradeLog {
    fn append(&self, key: &str, records: &[TradeRecord]) -> Result<(), CombitraderError> {
        self.appends
            .borrow_mut()
            .push((key.to_string(), records.to_vec()));
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The first `count` weekdays starting at `start`.
pub fn trading_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(count)
        .collect()
}

/// Bars at the given closes with the safety line 10 below each close.
pub fn series_with_closes(code: &str, days: &[NaiveDate], closes: &[f64]) -> Series {
    let bars = days
        .iter()
        .zip(closes)
        .map(|(&date, &close)| OhlcvBar {
            date,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10_000,
        })
        .collect();
    let safety = closes.iter().map(|c| c - 10.0).collect();
    Series::new(code, bars)
        .with_column(SAFETY_COLUMN, safety)
        .unwrap()
}

/// Steadily rising closes, one per trading day.
pub fn rising_series(code: &str, days: &[NaiveDate], start_price: f64) -> Series {
    let closes: Vec<f64> = (0..days.len()).map(|i| start_price + i as f64).collect();
    series_with_closes(code, days, &closes)
}

pub fn group(optional: Vec<Condition>) -> RuleGroup {
    RuleGroup {
        required: vec![],
        optional,
    }
}

/// Enters every day it can; never exits on its own rules.
pub fn always_entry_strategy(structural: StructuralConditions) -> Strategy {
    Strategy {
        new: group(vec![Condition::Always]),
        taking: RuleGroup::default(),
        stop_loss: RuleGroup::default(),
        closing: RuleGroup::default(),
        structural,
    }
}

pub fn same_exit_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}
