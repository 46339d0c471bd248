//! Condition evaluation.
//!
//! # Evaluation Semantics
//!
//! - Operands resolve against the window selected by the comparison's leg;
//!   an absent leg, column or too-short window resolves to NaN
//! - Any comparison involving NaN is `false`
//! - `ALL`: short-circuits on first `false`, `true` when empty
//! - `ANY`: short-circuits on first `true`, `false` when empty

use crate::domain::condition::{Condition, Operand};
use crate::domain::context::Context;
use crate::domain::series::SeriesWindow;

pub fn evaluate(condition: &Condition, ctx: &Context<'_>) -> bool {
    match condition {
        Condition::Always => true,
        Condition::Never => false,
        Condition::Compare {
            leg,
            left,
            op,
            right,
        } => {
            let window = ctx.window(leg);
            let l = resolve_operand(left, window, ctx);
            let r = resolve_operand(right, window, ctx);
            op.apply(l, r)
        }
        Condition::All(items) => items.iter().all(|c| evaluate(c, ctx)),
        Condition::Any(items) => items.iter().any(|c| evaluate(c, ctx)),
        Condition::Not(inner) => !evaluate(inner, ctx),
    }
}

/// True iff every condition holds.
pub fn all(conditions: &[Condition], ctx: &Context<'_>) -> bool {
    conditions.iter().all(|c| evaluate(c, ctx))
}

fn resolve_operand(operand: &Operand, window: Option<SeriesWindow<'_>>, ctx: &Context<'_>) -> f64 {
    match operand {
        Operand::Constant(v) => *v,
        Operand::Gain => ctx.gain(),
        Operand::Held => ctx.position.held as f64,
        Operand::WinStreak => f64::from(ctx.risk.win_streak),
        Operand::LoseStreak => f64::from(ctx.risk.lose_streak),
        Operand::TradeGain => ctx.risk.trade_gain,
        Operand::Column(column) => window.map_or(f64::NAN, |w| w.latest(column)),
        Operand::Lagged { column, bars } => window.map_or(f64::NAN, |w| w.value(column, *bars)),
        Operand::Min { column, bars } => window.map_or(f64::NAN, |w| w.min(column, *bars)),
        Operand::Max { column, bars } => window.map_or(f64::NAN, |w| w.max(column, *bars)),
        Operand::Sum { column, bars } => window.map_or(f64::NAN, |w| w.sum(column, *bars)),
    }
}
