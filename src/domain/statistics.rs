//! Run-level result statistics merged from per-instrument outcomes.

use crate::domain::simulator::InstrumentStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultStatistics {
    /// Instruments that produced statistics, in code order.
    pub codes: Vec<String>,
    /// Instruments with a positive return.
    pub win: Vec<String>,
    /// Instruments with a negative return.
    pub lose: Vec<String>,
    pub gain: f64,
    #[serde(rename = "return")]
    pub return_rate: f64,
    pub drawdown: f64,
    pub max_drawdown: f64,
    pub trade: usize,
    pub win_trade: usize,
    pub position_size: f64,
    pub max_position_size: u64,
    pub position_term: f64,
    pub max_position_term: u32,
    pub max_unavailable_assets: f64,
}

impl ResultStatistics {
    /// Merge per-instrument statistics against the starting equity `assets`.
    pub fn merge(stats: &[InstrumentStats], assets: f64) -> Self {
        let gain: f64 = stats.iter().map(|s| s.gain).sum();
        let drawdowns: Vec<f64> = stats.iter().map(|s| s.max_drawdown).collect();
        let sizes: Vec<u64> = stats
            .iter()
            .flat_map(|s| s.position_sizes.iter().copied())
            .filter(|&q| q > 0)
            .collect();
        let terms: Vec<u32> = stats
            .iter()
            .flat_map(|s| s.position_terms.iter().copied())
            .filter(|&t| t > 0)
            .collect();

        let mut ordered: Vec<&InstrumentStats> = stats.iter().collect();
        ordered.sort_by(|a, b| a.code.cmp(&b.code));
        let codes_where = |keep: fn(f64) -> bool| -> Vec<String> {
            ordered
                .iter()
                .filter(|s| keep(s.return_rate))
                .map(|s| s.code.clone())
                .collect()
        };

        Self {
            codes: codes_where(|_| true),
            win: codes_where(|r| r > 0.0),
            lose: codes_where(|r| r < 0.0),
            gain,
            return_rate: if assets > 0.0 { gain / assets } else { 0.0 },
            drawdown: mean(drawdowns.iter().copied()),
            max_drawdown: drawdowns.iter().copied().fold(0.0, f64::max),
            trade: stats.iter().map(|s| s.trades).sum(),
            win_trade: stats.iter().map(|s| s.wins).sum(),
            position_size: mean(sizes.iter().map(|&q| q as f64)),
            max_position_size: sizes.iter().copied().max().unwrap_or(0),
            position_term: mean(terms.iter().map(|&t| f64::from(t))),
            max_position_term: terms.iter().copied().max().unwrap_or(0),
            max_unavailable_assets: stats
                .iter()
                .map(|s| s.max_unavailable_assets)
                .fold(0.0, f64::max),
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.trade == 0 {
            0.0
        } else {
            self.win_trade as f64 / self.trade as f64
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stats(code: &str, gain: f64, drawdown: f64, sizes: Vec<u64>, terms: Vec<u32>) -> InstrumentStats {
        InstrumentStats {
            code: code.into(),
            gain,
            return_rate: gain / 1_000_000.0,
            max_drawdown: drawdown,
            trades: sizes.len(),
            wins: usize::from(gain > 0.0),
            position_sizes: sizes,
            position_terms: terms,
            final_assets: 1_000_000.0 + gain,
            max_unavailable_assets: 50_000.0,
        }
    }

    #[test]
    fn merge_sums_and_averages() {
        let merged = ResultStatistics::merge(
            &[
                stats("C", 0.0, 0.0, vec![], vec![]),
                stats("A", 3_000.0, 0.02, vec![100, 300], vec![2, 4]),
                stats("B", -1_000.0, 0.04, vec![200], vec![6]),
            ],
            1_000_000.0,
        );
        assert_eq!(merged.codes, vec!["A", "B", "C"]);
        assert_eq!(merged.win, vec!["A"]);
        assert_eq!(merged.lose, vec!["B"]);
        assert_relative_eq!(merged.gain, 2_000.0);
        assert_relative_eq!(merged.return_rate, 0.002);
        assert_relative_eq!(merged.drawdown, 0.02);
        assert_relative_eq!(merged.max_drawdown, 0.04);
        assert_eq!(merged.trade, 3);
        assert_eq!(merged.win_trade, 1);
        assert_relative_eq!(merged.position_size, 200.0);
        assert_eq!(merged.max_position_size, 300);
        assert_relative_eq!(merged.position_term, 4.0);
        assert_eq!(merged.max_position_term, 6);
        assert_relative_eq!(merged.max_unavailable_assets, 50_000.0);
    }

    #[test]
    fn empty_merge_is_zeroed() {
        let merged = ResultStatistics::merge(&[], 1_000_000.0);
        assert_eq!(merged, ResultStatistics::default());
        assert_eq!(merged.win_rate(), 0.0);
    }

    #[test]
    fn return_serializes_under_plain_name() {
        let json = serde_json::to_string(&ResultStatistics::default()).unwrap();
        assert!(json.contains(r#""return":0.0"#));
        assert!(json.contains(r#""codes":[]"#));
    }
}
