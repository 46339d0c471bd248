//! Configuration validation.
//!
//! Validates all config fields before a run, reporting the offending section
//! and key. The value parsers are shared with the CLI's config builders.

use crate::domain::combination::MAX_CONDITIONS;
use crate::domain::error::CombitraderError;
use crate::domain::genome::Decision;
use crate::domain::selection::{MAX_WEIGHT, Weights};
use crate::domain::strategy::StrategyKind;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const WEIGHTS_PREFIX: &str = "weights.";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    validate_assets(config)?;
    validate_dates(config)?;
    validate_non_negative(config, "backtest", "validate_term")?;
    validate_min_history(config)?;
    require(config, "backtest", "data_dir")?;
    validate_codes(config)
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    let kind = parse_kind(config)?;
    validate_seeds(config)?;
    validate_condition_size(config)?;
    validate_stop_loss_rate(config)?;
    validate_weights(config)?;
    require(config, "strategy", "tags")?;
    match kind {
        StrategyKind::Combination => Ok(()),
        StrategyKind::Index => require(config, "strategy", "benchmark").map(|_| ()),
        StrategyKind::NewHigh => {
            require(config, "strategy", "portfolio_dir")?;
            if config.get_int("strategy", "portfolio_limit", 10) < 1 {
                return Err(invalid(
                    "strategy",
                    "portfolio_limit",
                    "portfolio_limit must be at least 1",
                ));
            }
            Ok(())
        }
    }
}

pub fn validate_genome_config(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    for decision in Decision::ALL {
        if let Some(value) = config.get_string("genome", decision.name()) {
            parse_ordinal(&value).map_err(|reason| invalid("genome", decision.name(), reason))?;
        }
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> CombitraderError {
    CombitraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, CombitraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(CombitraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_assets(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    let value = config.get_double("backtest", "assets", 3_000_000.0);
    if value <= 0.0 {
        return Err(invalid("backtest", "assets", "assets must be positive"));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    let start_date = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;

    if start_date > end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, CombitraderError> {
    match value {
        None => Err(CombitraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), CombitraderError> {
    if config.get_int(section, key, 0) < 0 {
        return Err(invalid(section, key, format!("{key} must be non-negative")));
    }
    Ok(())
}

fn validate_min_history(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    if config.get_int("backtest", "min_history", 1) < 1 {
        return Err(invalid(
            "backtest",
            "min_history",
            "min_history must be at least 1",
        ));
    }
    Ok(())
}

/// Codes are optional here; a fixed-universe strategy reports them missing
/// when it is built.
fn validate_codes(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    match config.get_string("backtest", "codes") {
        Some(c) => parse_codes(&c)
            .map(|_| ())
            .map_err(|e| invalid("backtest", "codes", e.to_string())),
        None => Ok(()),
    }
}

/// Comma-separated names, kept as written.
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_kind(config: &dyn ConfigPort) -> Result<StrategyKind, CombitraderError> {
    let kind = config
        .get_string("strategy", "kind")
        .unwrap_or_else(|| StrategyKind::Combination.name().to_string());
    kind.trim()
        .parse()
        .map_err(|reason: String| invalid("strategy", "kind", reason))
}

/// Comma-separated seeds.
pub fn parse_seeds(input: &str) -> Result<Vec<u64>, String> {
    input
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<u64>()
                .map_err(|_| format!("'{token}' is not a seed"))
        })
        .collect()
}

fn validate_seeds(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    if let Some(seeds) = config.get_string("strategy", "seeds") {
        parse_seeds(&seeds).map_err(|reason| invalid("strategy", "seeds", reason))?;
    }
    Ok(())
}

fn validate_condition_size(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    let value = config.get_int("strategy", "condition_size", 5);
    if value < 1 || value > MAX_CONDITIONS as i64 {
        return Err(invalid(
            "strategy",
            "condition_size",
            format!("condition_size must be between 1 and {MAX_CONDITIONS}"),
        ));
    }
    Ok(())
}

fn validate_stop_loss_rate(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    let value = config.get_double("strategy", "stop_loss_rate", 0.02);
    if value <= 0.0 || value >= 1.0 {
        return Err(invalid(
            "strategy",
            "stop_loss_rate",
            "stop_loss_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

/// `index:weight` pairs separated by commas.
pub fn parse_weights(input: &str) -> Result<Weights, String> {
    let mut weights = Weights::new();
    for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (index, weight) = pair
            .split_once(':')
            .ok_or_else(|| format!("'{pair}' is not index:weight"))?;
        let index = index
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("'{index}' is not a catalog index"))?;
        let weight = weight
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|w| (0.0..=MAX_WEIGHT).contains(w))
            .ok_or_else(|| format!("'{weight}' is not a weight between 0 and {MAX_WEIGHT}"))?;
        weights.insert(index, weight);
    }
    Ok(weights)
}

fn validate_weights(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    for key in config.keys("strategy") {
        let Some(decision) = key.strip_prefix(WEIGHTS_PREFIX) else {
            continue;
        };
        decision
            .parse::<Decision>()
            .map_err(|reason| invalid("strategy", &key, reason))?;
        let value = config.get_string("strategy", &key).unwrap_or_default();
        parse_weights(&value).map_err(|reason| invalid("strategy", &key, reason))?;
    }
    Ok(())
}

pub fn parse_ordinal(input: &str) -> Result<u64, String> {
    input
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("'{}' is not a non-negative ordinal", input.trim()))
}
