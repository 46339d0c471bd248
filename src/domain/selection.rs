//! Seeded selection of a decision point's condition pool from the catalog.
//!
//! The random source is owned by the selector, never global: two selectors
//! built from the same seed draw the same indices no matter what else the
//! process has sampled.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Per-index sampling weights; unlisted indices weigh 1.
pub type Weights = BTreeMap<usize, f64>;

/// Weights are clamped to this so the running total stays finite.
pub const MAX_WEIGHT: f64 = 1e12;

#[derive(Debug, Clone)]
pub struct ConditionSelector {
    rng: StdRng,
}

impl ConditionSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw up to `size` distinct indices from `0..pool_len` without
    /// replacement, in draw order. Zero-weight and NaN-weight indices are
    /// never drawn; larger weights are capped at [`MAX_WEIGHT`].
    pub fn select(&mut self, pool_len: usize, size: usize, weights: &Weights) -> Vec<usize> {
        let mut remaining: Vec<(usize, f64)> = (0..pool_len)
            .map(|i| {
                let w = weights.get(&i).copied().unwrap_or(1.0);
                (i, if w.is_nan() { 0.0 } else { w.clamp(0.0, MAX_WEIGHT) })
            })
            .filter(|(_, w)| *w > 0.0)
            .collect();
        let mut chosen = Vec::with_capacity(size.min(remaining.len()));

        while chosen.len() < size && !remaining.is_empty() {
            let total: f64 = remaining.iter().map(|(_, w)| w).sum();
            let mut target = self.rng.gen_range(0.0..total);
            let mut pick = remaining.len() - 1;
            for (slot, (_, w)) in remaining.iter().enumerate() {
                if target < *w {
                    pick = slot;
                    break;
                }
                target -= w;
            }
            chosen.push(remaining.remove(pick).0);
        }
        chosen
    }
}

/// Pool indices drawn for one decision point across several seeds,
/// deduplicated and kept in first-drawn order.
pub fn merge_draws(draws: impl IntoIterator<Item = Vec<usize>>) -> Vec<usize> {
    let mut merged = Vec::new();
    for draw in draws {
        for i in draw {
            if !merged.contains(&i) {
                merged.push(i);
            }
        }
    }
    merged
}
