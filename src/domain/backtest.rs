//! Backtest orchestrator: drives the rule engine day by day over a changing
//! instrument universe.
//!
//! Each weekday the orchestrator asks the strategy family for newly selected
//! instruments, keeps every instrument that still holds a position, and steps
//! one [`InstrumentSimulator`] per target. Instruments touched by a corporate
//! event inside the validation window are skipped; the check is memoized in
//! the run's cache. At the end every open position is closed at the last
//! close inside the run window and the per-instrument results are merged.

use crate::domain::context::Direction;
use crate::domain::corporate::{ColumnFlag, CorporateEventCheck};
use crate::domain::error::CombitraderError;
use crate::domain::rule_engine::RuleEngine;
use crate::domain::series::{MarketData, Series};
use crate::domain::simulator::{
    InstrumentSimulator, InstrumentStats, SimulationError, SimulatorSetting, StepAction,
};
use crate::domain::statistics::ResultStatistics;
use crate::domain::strategy::StrategyFamily;
use crate::domain::trade_recorder::{TradeRecord, TradeRecorder, log_key};
use crate::ports::cache_port::{CacheKey, CachePort, memoize};
use crate::ports::data_port::DataPort;
use crate::ports::trade_log_port::TradeLogPort;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Starting equity of each instrument's account.
    pub assets: f64,
    /// Days looked back for corporate events.
    pub validate_term: i64,
    pub min_history: usize,
    /// Index series loaded in addition to the legs the strategy reads.
    pub benchmarks: Vec<String>,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            assets: 3_000_000.0,
            validate_term: 10,
            min_history: 1,
            benchmarks: Vec::new(),
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub statistics: ResultStatistics,
    pub trades: Vec<TradeRecord>,
    pub instruments: Vec<InstrumentStats>,
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Targets for a day: newly selected instruments plus prior targets that
/// still hold a position.
pub fn next_targets(
    subject: &[String],
    prior: &BTreeSet<String>,
    open_positions: &BTreeSet<String>,
) -> BTreeSet<String> {
    subject
        .iter()
        .cloned()
        .chain(prior.intersection(open_positions).cloned())
        .collect()
}

pub struct BacktestOrchestrator<'a> {
    config: BacktestConfig,
    family: &'a dyn StrategyFamily,
    engine: RuleEngine,
    data: &'a dyn DataPort,
    cache: Box<dyn CachePort + 'a>,
    events: Box<dyn CorporateEventCheck + 'a>,
    trade_log: Option<&'a dyn TradeLogPort>,
    market: MarketData,
    unavailable: BTreeSet<String>,
    simulators: BTreeMap<String, InstrumentSimulator>,
}

impl<'a> BacktestOrchestrator<'a> {
    /// `cache` is owned for the run's lifetime and must start empty.
    pub fn new(
        config: BacktestConfig,
        family: &'a dyn StrategyFamily,
        engine: RuleEngine,
        data: &'a dyn DataPort,
        cache: Box<dyn CachePort + 'a>,
    ) -> Self {
        Self {
            config,
            family,
            engine,
            data,
            cache,
            events: Box::new(ColumnFlag::default()),
            trade_log: None,
            market: MarketData::default(),
            unavailable: BTreeSet::new(),
            simulators: BTreeMap::new(),
        }
    }

    pub fn with_events(mut self, events: Box<dyn CorporateEventCheck + 'a>) -> Self {
        self.events = events;
        self
    }

    pub fn with_trade_log(mut self, trade_log: &'a dyn TradeLogPort) -> Self {
        self.trade_log = Some(trade_log);
        self
    }

    pub fn run(mut self) -> Result<BacktestReport, CombitraderError> {
        self.family.validate()?;
        let (start, end) = (self.config.start_date, self.config.end_date);
        if end < start {
            return Err(CombitraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "end_date".into(),
                reason: format!("{end} is before start_date {start}"),
            });
        }
        self.load_index();
        info!(
            strategy = self.family.name(),
            %start,
            %end,
            "running backtest"
        );

        let mut targets = BTreeSet::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            if !is_weekday(date) {
                debug!(%date, "skipping non-weekday");
                continue;
            }
            let subject = self.family.subject(date).unwrap_or_else(|e| {
                warn!(%date, error = %e, "subject selection failed");
                Vec::new()
            });
            let open: BTreeSet<String> = self
                .simulators
                .iter()
                .filter(|(_, sim)| sim.has_position())
                .map(|(code, _)| code.clone())
                .collect();
            targets = next_targets(&subject, &targets, &open);
            debug!(%date, targets = ?targets, "day");

            for code in &targets {
                self.ensure_loaded(code);
            }
            for code in &targets {
                self.step(code, date);
            }
        }

        self.force_close();
        self.finish()
    }

    fn load_index(&mut self) {
        let mut legs = self.engine.strategy().index_legs();
        legs.extend(self.config.benchmarks.iter().cloned());
        for leg in legs {
            match self.data.load_series(&leg, self.config.end_date) {
                Ok(series) => {
                    debug!(leg = %leg, bars = series.bar_count(), "loaded index series");
                    self.market.index.insert(leg, series);
                }
                Err(e) => warn!(leg = %leg, error = %e, "index series unavailable"),
            }
        }
    }

    fn ensure_loaded(&mut self, code: &str) {
        if self.market.stocks.contains_key(code) || self.unavailable.contains(code) {
            return;
        }
        match self.data.load_series(code, self.config.end_date) {
            Ok(series) => {
                self.market.stocks.insert(code.to_string(), series);
            }
            Err(e) => {
                warn!(code = %code, error = %e, "load failed, instrument skipped");
                self.unavailable.insert(code.to_string());
            }
        }
    }

    fn corporate_event(&self, series: &Series, date: NaiveDate) -> Result<bool, CombitraderError> {
        let window_start = date - Duration::days(self.config.validate_term);
        let key = CacheKey::new(series.code.clone(), window_start, date);
        let value = memoize(self.cache.as_ref(), &key, || {
            Value::Bool(self.events.occurred(series, window_start, date))
        })?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn step(&mut self, code: &str, date: NaiveDate) {
        let Some(series) = self.market.stocks.get(code) else {
            debug!(code = %code, %date, "no data");
            return;
        };
        if series.get_bar(date).is_none() {
            debug!(code = %code, %date, "no bar");
            return;
        }

        match self.corporate_event(series, date) {
            Ok(false) => {}
            Ok(true) => {
                debug!(code = %code, %date, "corporate event, skipped");
                return;
            }
            Err(e) => {
                warn!(code = %code, %date, error = %e, "corporate event check failed");
                return;
            }
        }

        let Some(daily) = series.window(date) else {
            return;
        };
        let index = self.market.index_windows(date);
        let setting = SimulatorSetting {
            assets: self.config.assets,
            min_history: self.config.min_history,
            direction: self.engine.config().direction,
        };
        let sim = self
            .simulators
            .entry(code.to_string())
            .or_insert_with(|| InstrumentSimulator::new(code, setting));

        match sim.step(&self.engine, daily, &index) {
            Ok(StepAction::Hold) => {}
            Ok(StepAction::Entered { quantity, price }) => {
                debug!(code = %code, %date, quantity, price, "entry");
            }
            Ok(StepAction::Exited { decision, trade }) => {
                debug!(code = %code, %date, %decision, gain = trade.pnl, "exit");
            }
            Ok(StepAction::Unfunded { quantity }) => {
                debug!(code = %code, %date, quantity, "entry not funded");
            }
            Err(e @ SimulationError::InsufficientHistory { .. }) => {
                debug!(%date, "{e}");
            }
            Err(e) => warn!(code = %code, %date, error = %e, "step failed"),
        }
    }

    fn force_close(&mut self) {
        let (start, end) = (self.config.start_date, self.config.end_date);
        for (code, sim) in self.simulators.iter_mut() {
            if !sim.has_position() {
                continue;
            }
            let last = self
                .market
                .stocks
                .get(code)
                .and_then(|s| s.last_in_range(start, end))
                .map(|bar| (bar.date, bar.close))
                .or_else(|| sim.last_price());
            let Some((date, price)) = last else {
                continue;
            };
            if let Some(trade) = sim.force_close(date, price) {
                debug!(code = %code, %date, price, gain = trade.pnl, "forced close");
            }
        }
    }

    /// Strategy flavour the trade log is filed under.
    fn log_prefix(&self) -> String {
        match self.engine.config().direction {
            Direction::Long => self.family.name().to_string(),
            Direction::Short => format!("{}_short", self.family.name()),
        }
    }

    fn finish(self) -> Result<BacktestReport, CombitraderError> {
        let mut recorder = TradeRecorder::new();
        let mut instruments = Vec::with_capacity(self.simulators.len());
        for sim in self.simulators.values() {
            recorder.concat(sim.trades());
            instruments.push(sim.stats());
        }
        let statistics = ResultStatistics::merge(&instruments, self.config.assets);
        let trades = recorder.records();

        if let Some(log) = self.trade_log {
            log.append(
                &log_key(
                    &self.log_prefix(),
                    self.config.start_date,
                    self.config.end_date,
                ),
                &trades,
            )?;
        }

        info!(
            codes = statistics.codes.len(),
            trades = statistics.trade,
            gain = statistics.gain,
            "backtest finished"
        );
        Ok(BacktestReport {
            statistics,
            trades,
            instruments,
        })
    }
}
