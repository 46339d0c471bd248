//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_portfolio_subjects::CsvPortfolioSubjects;
use crate::adapters::csv_trade_log::CsvTradeLog;
use crate::adapters::disk_cache::DiskCache;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::genome_file::load_genome;
use crate::adapters::memory_cache::MemoryCache;
use crate::domain::backtest::{BacktestConfig, BacktestOrchestrator};
use crate::domain::catalog::StandardCatalog;
use crate::domain::context::Direction;
use crate::domain::config_validation::{
    WEIGHTS_PREFIX, parse_date, parse_kind, parse_list, parse_ordinal, parse_seeds,
    parse_weights, validate_backtest_config, validate_genome_config, validate_strategy_config,
};
use crate::domain::error::CombitraderError;
use crate::domain::genome::{Decision, GenomeRecord, StrategySetting};
use crate::domain::rule_engine::{EngineConfig, RuleEngine};
use crate::domain::strategy::{
    FamilyConfig, PinnedFamily, SelectionSetting, StrategyFactory, StrategyFamily, StrategyKind,
};
use crate::domain::universe::{parse_codes, validate_universe};
use crate::ports::cache_port::CachePort;
use crate::ports::config_port::ConfigPort;
use crate::ports::subject_port::SubjectPort;

#[derive(Parser, Debug)]
#[command(
    name = "combitrader",
    about = "Combinatorial rule-based strategy search and backtester"
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest for one genome
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Genome JSON file; overrides the [genome] section
        #[arg(short, long)]
        genome: Option<PathBuf>,
        /// Trade a single code instead of the configured universe
        #[arg(long)]
        code: Option<String>,
        /// Also write the statistics JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the search-space size of each decision point
    Space {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the conditions a genome selects
    Describe {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        genome: Option<PathBuf>,
    },
    /// Validate configuration and decode the genome
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            genome,
            code,
            output,
        } => run_backtest(&config, genome.as_deref(), code.as_deref(), output.as_deref()),
        Command::Space { config } => run_space(&config),
        Command::Describe { config, genome } => run_describe(&config, genome.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CombitraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| CombitraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn validate_all(config: &dyn ConfigPort) -> Result<(), CombitraderError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_genome_config(config)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, CombitraderError> {
    let start_date = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;

    let mut bt = BacktestConfig::new(start_date, end_date);
    bt.assets = config.get_double("backtest", "assets", bt.assets);
    bt.validate_term = config.get_int("backtest", "validate_term", bt.validate_term);
    bt.min_history = config.get_int("backtest", "min_history", 1).max(1) as usize;
    bt.benchmarks = config
        .get_string("backtest", "benchmarks")
        .map(|b| parse_list(&b))
        .unwrap_or_default();
    Ok(bt)
}

pub fn build_engine_config(config: &dyn ConfigPort) -> EngineConfig {
    let defaults = EngineConfig::default();
    EngineConfig {
        simple: config.get_bool("strategy", "simple", defaults.simple),
        position_sizing: config.get_bool("strategy", "position_sizing", defaults.position_sizing),
        stop_loss_rate: config.get_double("strategy", "stop_loss_rate", defaults.stop_loss_rate),
        direction: if config.get_bool("strategy", "short", false) {
            Direction::Short
        } else {
            Direction::Long
        },
    }
}

pub fn build_selection(config: &dyn ConfigPort) -> Result<SelectionSetting, CombitraderError> {
    let invalid = |key: &str, reason: String| CombitraderError::ConfigInvalid {
        section: "strategy".into(),
        key: key.into(),
        reason,
    };
    let mut selection = SelectionSetting::default();
    if let Some(seeds) = config.get_string("strategy", "seeds") {
        selection.seeds = parse_seeds(&seeds).map_err(|r| invalid("seeds", r))?;
    }
    selection.condition_size =
        config.get_int("strategy", "condition_size", selection.condition_size as i64).max(0) as usize;
    for key in config.keys("strategy") {
        let Some(name) = key.strip_prefix(WEIGHTS_PREFIX) else {
            continue;
        };
        let decision: Decision = name.parse().map_err(|r| invalid(&key, r))?;
        let value = config.get_string("strategy", &key).unwrap_or_default();
        let weights = parse_weights(&value).map_err(|r| invalid(&key, r))?;
        selection.weights.insert(decision, weights);
    }
    Ok(selection)
}

pub fn build_family(
    config: &dyn ConfigPort,
    code_override: Option<&str>,
) -> Result<Box<dyn StrategyFamily>, CombitraderError> {
    let kind = parse_kind(config)?;
    let codes = match config.get_string("backtest", "codes") {
        Some(list) => parse_codes(&list).map_err(|e| CombitraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "codes".into(),
            reason: e.to_string(),
        })?,
        None => Vec::new(),
    };
    let family_config = FamilyConfig {
        codes,
        tags: config
            .get_string("strategy", "tags")
            .map(|t| parse_list(&t))
            .unwrap_or_default(),
        benchmark: config.get_string("strategy", "benchmark"),
    };

    let subjects = match (kind, config.get_string("strategy", "portfolio_dir")) {
        (StrategyKind::NewHigh, Some(dir)) => {
            let assets = config.get_double("backtest", "assets", 3_000_000.0);
            let limit = config.get_int("strategy", "portfolio_limit", 10).max(1) as usize;
            let source = match config.get_string("strategy", "portfolio_max_price") {
                Some(_) => CsvPortfolioSubjects::new(
                    PathBuf::from(dir),
                    config.get_double("strategy", "portfolio_max_price", f64::MAX),
                    limit,
                ),
                None => CsvPortfolioSubjects::for_assets(PathBuf::from(dir), assets, limit),
            };
            Some(Box::new(source) as Box<dyn SubjectPort>)
        }
        _ => None,
    };

    let family = match code_override {
        Some(code) => Box::new(PinnedFamily {
            inner: kind.build(family_config, subjects),
            code: code.trim().to_string(),
        }) as Box<dyn StrategyFamily>,
        None => kind.build(family_config, subjects),
    };
    family.validate()?;
    Ok(family)
}

/// Build the factory, preferring the seeds and weights recorded in `genome`.
pub fn build_factory(
    config: &dyn ConfigPort,
    code_override: Option<&str>,
    genome: Option<&GenomeRecord>,
) -> Result<StrategyFactory, CombitraderError> {
    let family = build_family(config, code_override)?;
    let mut selection = build_selection(config)?;
    if let Some(record) = genome {
        if !record.seeds.is_empty() {
            selection.seeds = record.seeds.clone();
        }
        if !record.weights.is_empty() {
            selection.weights = record.weights.clone();
        }
        if !record.kind.is_empty() && record.kind != family.name() {
            warn!(
                genome = %record.kind,
                config = family.name(),
                "genome was recorded for a different strategy kind"
            );
        }
    }
    let factory = StrategyFactory::new(family, &StandardCatalog, selection)?;
    if let Some(record) = genome {
        let current = factory.record(&record.setting).selected;
        for (decision, indices) in &record.selected {
            if current.get(decision) != Some(indices) {
                warn!(%decision, "catalog selection differs from the genome record");
            }
        }
    }
    Ok(factory)
}

pub fn read_setting(config: &dyn ConfigPort) -> Result<StrategySetting, CombitraderError> {
    let mut values = [0u64; 4];
    for (value, decision) in values.iter_mut().zip(Decision::ALL) {
        if let Some(raw) = config.get_string("genome", decision.name()) {
            *value = parse_ordinal(&raw).map_err(|reason| CombitraderError::ConfigInvalid {
                section: "genome".into(),
                key: decision.name().into(),
                reason,
            })?;
        }
    }
    let [new, taking, stop_loss, closing] = values;
    Ok(StrategySetting {
        new,
        taking,
        stop_loss,
        closing,
    })
}

fn load_genome_option(path: Option<&Path>) -> Result<Option<GenomeRecord>, CombitraderError> {
    path.map(|p| {
        info!(path = %p.display(), "loading genome");
        load_genome(p)
    })
    .transpose()
}

fn run_backtest(
    config_path: &Path,
    genome_path: Option<&Path>,
    code_override: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), CombitraderError> {
    info!(path = %config_path.display(), "loading config");
    let config = load_config(config_path)?;
    validate_all(&config)?;

    let genome = load_genome_option(genome_path)?;
    let setting = match &genome {
        Some(record) => record.setting,
        None => read_setting(&config)?,
    };
    let factory = build_factory(&config, code_override, genome.as_ref())?;
    let strategy = factory.create(&setting)?;
    let engine = RuleEngine::new(strategy, build_engine_config(&config));
    let bt = build_backtest_config(&config)?;

    let data_dir = config.get_string("backtest", "data_dir").unwrap_or_default();
    let data = CsvAdapter::new(PathBuf::from(data_dir));
    let cache: Box<dyn CachePort> = match config.get_string("backtest", "cache_dir") {
        Some(dir) => Box::new(DiskCache::new(dir)?),
        None => Box::new(MemoryCache::new()),
    };
    let trade_log = config
        .get_string("backtest", "trade_log_dir")
        .map(|dir| CsvTradeLog::new(PathBuf::from(dir)));

    let mut orchestrator = BacktestOrchestrator::new(bt, factory.family(), engine, &data, cache);
    if let Some(log) = &trade_log {
        orchestrator = orchestrator.with_trade_log(log);
    }
    let report = orchestrator.run()?;

    let json = serde_json::to_string_pretty(&report.statistics)?;
    println!("{json}");
    if let Some(path) = output_path {
        fs::write(path, json + "\n")?;
        info!(path = %path.display(), "statistics written");
    }
    Ok(())
}

fn run_space(config_path: &Path) -> Result<(), CombitraderError> {
    let config = load_config(config_path)?;
    validate_strategy_config(&config)?;
    let factory = build_factory(&config, None, None)?;
    for (decision, size) in Decision::ALL.into_iter().zip(factory.ranges()) {
        println!("{decision}\t{size}");
    }
    Ok(())
}

fn run_describe(config_path: &Path, genome_path: Option<&Path>) -> Result<(), CombitraderError> {
    let config = load_config(config_path)?;
    validate_strategy_config(&config)?;
    let genome = load_genome_option(genome_path)?;
    let setting = match &genome {
        Some(record) => record.setting,
        None => read_setting(&config)?,
    };
    let factory = build_factory(&config, None, genome.as_ref())?;
    for (decision, description) in factory.describe(&setting)? {
        print!("{decision} {description}");
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), CombitraderError> {
    let config = load_config(config_path)?;
    validate_all(&config)?;
    let factory = build_factory(&config, None, None)?;
    let setting = read_setting(&config)?;
    factory.create(&setting)?;
    eprintln!("strategy: {}", factory.family().name());
    for (decision, size) in Decision::ALL.into_iter().zip(factory.ranges()) {
        eprintln!("  {decision}: ordinal {} of {size}", setting.ordinal(decision));
    }

    if parse_kind(&config)? == StrategyKind::Combination {
        let bt = build_backtest_config(&config)?;
        let data_dir = config.get_string("backtest", "data_dir").unwrap_or_default();
        let data = CsvAdapter::new(PathBuf::from(data_dir));
        let codes = factory.family().subject(bt.start_date)?;
        let result = validate_universe(&data, codes, bt.start_date, bt.end_date, bt.min_history)?;
        eprintln!(
            "universe: {} codes ok, {} skipped",
            result.universe.count(),
            result.skipped.len()
        );
    }

    eprintln!("configuration is valid");
    Ok(())
}
