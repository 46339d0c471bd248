//! Per-instrument execution: applies rule-engine orders at the close.
//!
//! The simulator owns everything the rule engine reads but never mutates:
//! cash, the open [`Position`], the trade ledger, drawdown history and
//! win/lose streaks. Each [`step`](InstrumentSimulator::step) evaluates exits
//! first (closing, then stop-loss, then taking); an entry is only considered
//! on a day without an exit.

use crate::domain::condition_eval::evaluate;
use crate::domain::context::{Context, DRAWDOWN_WINDOW, Direction, RiskState};
use crate::domain::genome::Decision;
use crate::domain::position::{ClosedTrade, Position};
use crate::domain::rule_engine::{OrderInstruction, RuleEngine};
use crate::domain::series::SeriesWindow;
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("{code} has {bars} bars on {date}, needs {minimum}")]
    InsufficientHistory {
        code: String,
        date: NaiveDate,
        bars: usize,
        minimum: usize,
    },

    #[error("{code} has no usable close on {date}")]
    MissingPrice { code: String, date: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorSetting {
    /// Starting equity of the instrument's account.
    pub assets: f64,
    /// Bars required before the rule engine is consulted.
    pub min_history: usize,
    pub direction: Direction,
}

impl Default for SimulatorSetting {
    fn default() -> Self {
        Self {
            assets: 3_000_000.0,
            min_history: 1,
            direction: Direction::Long,
        }
    }
}

/// What a step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    Hold,
    Entered { quantity: u64, price: f64 },
    Exited { decision: Decision, trade: ClosedTrade },
    /// Entry signalled but the account could not pay for it.
    Unfunded { quantity: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentStats {
    pub code: String,
    pub gain: f64,
    pub return_rate: f64,
    pub max_drawdown: f64,
    pub trades: usize,
    pub wins: usize,
    pub position_sizes: Vec<u64>,
    pub position_terms: Vec<u32>,
    pub final_assets: f64,
    pub max_unavailable_assets: f64,
}

#[derive(Debug, Clone)]
pub struct InstrumentSimulator {
    code: String,
    setting: SimulatorSetting,
    cash: f64,
    position: Position,
    trades: Vec<ClosedTrade>,
    peak_equity: f64,
    drawdowns: Vec<f64>,
    max_drawdown: f64,
    win_streak: u32,
    lose_streak: u32,
    trade_gain: f64,
    max_unavailable: f64,
    last_price: Option<(NaiveDate, f64)>,
}

impl InstrumentSimulator {
    pub fn new(code: impl Into<String>, setting: SimulatorSetting) -> Self {
        Self {
            code: code.into(),
            setting,
            cash: setting.assets,
            position: Position::new(setting.direction),
            trades: Vec::new(),
            peak_equity: setting.assets,
            drawdowns: Vec::new(),
            max_drawdown: 0.0,
            win_streak: 0,
            lose_streak: 0,
            trade_gain: 0.0,
            max_unavailable: 0.0,
            last_price: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn has_position(&self) -> bool {
        self.position.is_open()
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.liquidation_value(price)
    }

    /// Account memory handed to the rule engine.
    pub fn risk_state(&self) -> RiskState {
        let from = self.drawdowns.len().saturating_sub(DRAWDOWN_WINDOW);
        RiskState {
            drawdowns: self.drawdowns[from..].to_vec(),
            win_streak: self.win_streak,
            lose_streak: self.lose_streak,
            trade_gain: self.trade_gain,
        }
    }

    /// Run one day for this instrument at the window's latest bar.
    pub fn step(
        &mut self,
        engine: &RuleEngine,
        daily: SeriesWindow<'_>,
        index: &BTreeMap<&str, SeriesWindow<'_>>,
    ) -> Result<StepAction, SimulationError> {
        let date = daily.date();
        if daily.len() < self.setting.min_history {
            return Err(SimulationError::InsufficientHistory {
                code: self.code.clone(),
                date,
                bars: daily.len(),
                minimum: self.setting.min_history,
            });
        }
        let price = daily.latest("close");
        if !price.is_finite() || price <= 0.0 {
            return Err(SimulationError::MissingPrice {
                code: self.code.clone(),
                date,
            });
        }
        self.last_price = Some((date, price));

        if self.position.is_open() {
            self.position.term += 1;
        }

        let ctx = Context {
            date,
            daily,
            index,
            position: self.position.view(),
            risk: self.risk_state(),
            equity: self.equity(price),
        };

        let action = if self.position.is_open() {
            self.exit(engine, &ctx, price)
        } else {
            None
        };
        let action = match action {
            Some(action) => action,
            None => match engine.entry(&ctx) {
                Some(order) if evaluate(&order.fill, &ctx) => self.enter(date, &order, price),
                _ => StepAction::Hold,
            },
        };

        self.mark(price);
        Ok(action)
    }

    fn exit(&mut self, engine: &RuleEngine, ctx: &Context<'_>, price: f64) -> Option<StepAction> {
        let signals = [
            (Decision::Closing, engine.closing(ctx)),
            (Decision::StopLoss, engine.stop_loss(ctx)),
            (Decision::Taking, engine.taking(ctx)),
        ];
        let (decision, _) = signals
            .into_iter()
            .find_map(|(d, order)| order.filter(|o| evaluate(&o.fill, ctx)).map(|o| (d, o)))?;
        let trade = self.close(ctx.date, price)?;
        Some(StepAction::Exited { decision, trade })
    }

    fn enter(&mut self, date: NaiveDate, order: &OrderInstruction, price: f64) -> StepAction {
        let cost = order.quantity as f64 * price;
        if cost > self.cash {
            return StepAction::Unfunded {
                quantity: order.quantity,
            };
        }
        self.cash -= cost;
        self.position.add(date, order.quantity, price);
        self.max_unavailable = self.max_unavailable.max(self.position.cost);
        StepAction::Entered {
            quantity: order.quantity,
            price,
        }
    }

    fn close(&mut self, date: NaiveDate, price: f64) -> Option<ClosedTrade> {
        let proceeds = self.position.liquidation_value(price);
        let trade = self.position.close(&self.code, date, price)?;
        self.cash += proceeds;
        self.trade_gain += trade.pnl;
        if trade.is_win() {
            self.win_streak += 1;
            self.lose_streak = 0;
        } else {
            self.lose_streak += 1;
            self.win_streak = 0;
        }
        self.trades.push(trade.clone());
        Some(trade)
    }

    /// Record the day's drawdown sample at `price`.
    fn mark(&mut self, price: f64) {
        let equity = self.equity(price);
        self.peak_equity = self.peak_equity.max(equity);
        let drawdown = if self.peak_equity > 0.0 {
            (self.peak_equity - equity) / self.peak_equity
        } else {
            0.0
        };
        self.max_drawdown = self.max_drawdown.max(drawdown);
        self.drawdowns.push(drawdown);
    }

    /// Close any open position at the last price seen on or before `end`.
    pub fn force_close(&mut self, date: NaiveDate, price: f64) -> Option<ClosedTrade> {
        if !self.position.is_open() {
            return None;
        }
        let trade = self.close(date, price)?;
        self.mark(price);
        Some(trade)
    }

    pub fn last_price(&self) -> Option<(NaiveDate, f64)> {
        self.last_price
    }

    pub fn stats(&self) -> InstrumentStats {
        let gain: f64 = self.trades.iter().map(|t| t.pnl).sum();
        let assets = self.setting.assets;
        InstrumentStats {
            code: self.code.clone(),
            gain,
            return_rate: if assets > 0.0 { gain / assets } else { 0.0 },
            max_drawdown: self.max_drawdown,
            trades: self.trades.len(),
            wins: self.trades.iter().filter(|t| t.is_win()).count(),
            position_sizes: self.trades.iter().map(|t| t.quantity).collect(),
            position_terms: self.trades.iter().map(|t| t.term).collect(),
            final_assets: self.cash + self.position.cost,
            max_unavailable_assets: self.max_unavailable,
        }
    }
}
