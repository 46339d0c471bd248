//! Per-day decisions: entry, profit-taking, stop-loss and forced closing.
//!
//! Every decision is a pure function of the [`Context`]. The engine never
//! touches a position; it returns an [`OrderInstruction`] for the execution
//! side to apply, or `None`.
//!
//! # Position sizing
//!
//! - `risk = (close - safety) * (held + LOT)`, clamped to 0 below the line;
//!   a short strategy measures `fall_safety - close` instead
//! - `max_risk = equity * stop_loss_rate`
//! - `max_order = floor(max_risk / risk) * LOT`, 0 when `risk` is 0
//! - quantity is half the remaining capacity rounded up to a lot, a single
//!   lot after a safety-line breach, and 0 whenever there is no capacity or
//!   the result is below one lot

use crate::domain::condition::Condition;
use crate::domain::condition_eval;
use crate::domain::context::{Context, DRAWDOWN_WINDOW, Direction};
use crate::domain::strategy::Strategy;

pub const LOT: u64 = 100;
/// Return below which an open position is always cut.
pub const STOP_LOSS_RETURN: f64 = -0.02;
/// Drawdown acceleration that pauses new entries.
pub const DRAWDOWN_LIMIT: f64 = 0.06;
/// Indicator column holding the support-derived safety line.
pub const SAFETY_COLUMN: &str = "rising_safety";
/// Resistance-derived safety line for short strategies.
pub const FALL_SAFETY_COLUMN: &str = "fall_safety";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Enter on the combination alone, skipping structural entry gates.
    pub simple: bool,
    pub position_sizing: bool,
    pub stop_loss_rate: f64,
    pub direction: Direction,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            simple: false,
            position_sizing: false,
            stop_loss_rate: 0.02,
            direction: Direction::Long,
        }
    }
}

/// Order for the execution side; `fill` gates the fill itself.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderInstruction {
    pub quantity: u64,
    pub fill: Condition,
}

impl OrderInstruction {
    pub fn market(quantity: u64) -> Self {
        Self {
            quantity,
            fill: Condition::Always,
        }
    }
}

pub fn risk(ctx: &Context<'_>, direction: Direction) -> f64 {
    let distance = match direction {
        Direction::Long => ctx.price() - ctx.daily.latest(SAFETY_COLUMN),
        Direction::Short => ctx.daily.latest(FALL_SAFETY_COLUMN) - ctx.price(),
    };
    if distance.is_nan() || distance < 0.0 {
        return 0.0;
    }
    distance * (ctx.position.held + LOT) as f64
}

pub fn max_risk(equity: f64, stop_loss_rate: f64) -> f64 {
    equity * stop_loss_rate
}

pub fn max_order(max_risk: f64, risk: f64) -> u64 {
    if risk.is_nan() || risk <= 0.0 || max_risk <= 0.0 {
        return 0;
    }
    (max_risk / risk).floor() as u64 * LOT
}

/// The day's range touched or crossed the safety line.
pub fn falling(ctx: &Context<'_>, direction: Direction) -> bool {
    match direction {
        Direction::Long => ctx.daily.latest("low") <= ctx.daily.latest(SAFETY_COLUMN),
        Direction::Short => ctx.daily.latest("high") >= ctx.daily.latest(FALL_SAFETY_COLUMN),
    }
}

pub fn order_quantity(held: u64, max_risk: f64, risk: f64, falling: bool) -> u64 {
    let capacity = max_order(max_risk, risk).saturating_sub(held);
    if capacity == 0 {
        return 0;
    }
    let quantity = if falling {
        LOT
    } else {
        (capacity / 2).div_ceil(LOT) * LOT
    };
    if quantity < LOT { 0 } else { quantity }
}

/// False after a fast drawdown acceleration within the trailing window.
pub fn drawdown_throttle_passes(drawdowns: &[f64]) -> bool {
    let recent = &drawdowns[drawdowns.len().saturating_sub(DRAWDOWN_WINDOW)..];
    let rises: Vec<f64> = recent
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|delta| *delta > 0.0)
        .collect();
    let spike = rises.iter().any(|&delta| delta > DRAWDOWN_LIMIT);
    let total: f64 = rises.iter().sum();
    !spike && total < DRAWDOWN_LIMIT
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    strategy: Strategy,
    config: EngineConfig,
}

impl RuleEngine {
    pub fn new(strategy: Strategy, config: EngineConfig) -> Self {
        Self { strategy, config }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn entry(&self, ctx: &Context<'_>) -> Option<OrderInstruction> {
        if !self.strategy.new.is_satisfied(ctx) {
            return None;
        }

        let direction = self.config.direction;
        let risk = risk(ctx, direction);
        let max_risk = max_risk(ctx.equity, self.config.stop_loss_rate);
        let held = ctx.position.held;
        let quantity = if self.config.position_sizing {
            order_quantity(held, max_risk, risk, falling(ctx, direction))
        } else {
            LOT
        };

        if !self.config.simple {
            let gates = drawdown_throttle_passes(&ctx.risk.drawdowns)
                && risk > 0.0
                && held < max_order(max_risk, risk)
                && condition_eval::all(&self.strategy.structural.new, ctx);
            if !gates {
                return None;
            }
        }

        (quantity > 0).then(|| OrderInstruction::market(quantity))
    }

    pub fn taking(&self, ctx: &Context<'_>) -> Option<OrderInstruction> {
        let held = ctx.position.held;
        let fires = held > 0
            && condition_eval::all(&self.strategy.structural.taking, ctx)
            && self.strategy.taking.is_satisfied(ctx);
        fires.then(|| OrderInstruction::market(held))
    }

    pub fn stop_loss(&self, ctx: &Context<'_>) -> Option<OrderInstruction> {
        let held = ctx.position.held;
        if held == 0 {
            return None;
        }
        let cut = ctx.position.return_rate(ctx.price()) < STOP_LOSS_RETURN;
        let fires = cut
            || (condition_eval::all(&self.strategy.structural.stop_loss, ctx)
                && self.strategy.stop_loss.is_satisfied(ctx));
        fires.then(|| OrderInstruction::market(held))
    }

    pub fn closing(&self, ctx: &Context<'_>) -> Option<OrderInstruction> {
        let held = ctx.position.held;
        let fires = held > 0
            && condition_eval::all(&self.strategy.structural.closing, ctx)
            && self.strategy.closing.is_satisfied(ctx);
        fires.then(|| OrderInstruction::market(held))
    }
}
