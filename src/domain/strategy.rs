//! Strategy families, materialized strategies and the genome factory.
//!
//! A family decides what a strategy watches (`subject`), which conditions
//! always apply (`structural`) and where each decision point's pool comes
//! from (`pool`). [`StrategyFactory`] fixes the pools once from the catalog
//! and seeds, then turns genomes into executable [`Strategy`] values.

use crate::domain::catalog::{ConditionCatalog, NEW_SCORE_TAG};
use crate::domain::combination::{
    Combination, CombinationDescription, SearchSpace, group_satisfied,
};
use crate::domain::condition::{CompareOp, Condition, Leg, Operand};
use crate::domain::condition_eval::evaluate;
use crate::domain::context::Context;
use crate::domain::error::{CombitraderError, SearchSpaceError};
use crate::domain::genome::{Decision, GenomeRecord, StrategySetting};
use crate::domain::selection::{ConditionSelector, Weights, merge_draws};
use crate::ports::subject_port::SubjectPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Materialized combination for one decision point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleGroup {
    pub required: Vec<Condition>,
    pub optional: Vec<Condition>,
}

impl RuleGroup {
    pub fn from_combination(pool: &[Condition], combination: &Combination) -> Self {
        let pick = |indices: &[usize]| indices.iter().filter_map(|&i| pool.get(i).cloned()).collect();
        Self {
            required: pick(&combination.required),
            optional: pick(&combination.optional),
        }
    }

    /// Same rule as [`Combination::is_satisfied`], over materialized conditions.
    pub fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        group_satisfied(&self.required, &self.optional, |c| evaluate(c, ctx))
    }
}

/// Conditions that apply regardless of genome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralConditions {
    pub new: Vec<Condition>,
    pub taking: Vec<Condition>,
    pub stop_loss: Vec<Condition>,
    pub closing: Vec<Condition>,
}

impl StructuralConditions {
    pub fn get(&self, decision: Decision) -> &[Condition] {
        match decision {
            Decision::New => &self.new,
            Decision::Taking => &self.taking,
            Decision::StopLoss => &self.stop_loss,
            Decision::Closing => &self.closing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub new: RuleGroup,
    pub taking: RuleGroup,
    pub stop_loss: RuleGroup,
    pub closing: RuleGroup,
    pub structural: StructuralConditions,
}

impl Strategy {
    pub fn group(&self, decision: Decision) -> &RuleGroup {
        match decision {
            Decision::New => &self.new,
            Decision::Taking => &self.taking,
            Decision::StopLoss => &self.stop_loss,
            Decision::Closing => &self.closing,
        }
    }

    /// Benchmark legs any of the strategy's conditions read.
    pub fn index_legs(&self) -> BTreeSet<String> {
        let mut legs = BTreeSet::new();
        for d in Decision::ALL {
            let group = self.group(d);
            group
                .required
                .iter()
                .chain(&group.optional)
                .chain(self.structural.get(d))
                .for_each(|c| c.index_legs(&mut legs));
        }
        legs
    }
}

/// Where a decision point's condition pool comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolSource {
    /// Seeded draw from the catalog.
    Catalog,
    Fixed(Vec<Condition>),
}

pub trait StrategyFamily {
    fn name(&self) -> &'static str;

    /// Catalog tags (legs plus special families).
    fn tags(&self) -> Vec<String>;

    /// Instruments newly selected on `date`.
    fn subject(&self, date: NaiveDate) -> Result<Vec<String>, CombitraderError>;

    fn structural(&self) -> StructuralConditions;

    fn pool(&self, decision: Decision) -> PoolSource;

    /// Fail fast on configuration the family cannot run with.
    fn validate(&self) -> Result<(), CombitraderError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn StrategyFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyFamily").field("name", &self.name()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Combination,
    Index,
    NewHigh,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Combination => "combination",
            StrategyKind::Index => "index",
            StrategyKind::NewHigh => "new_high",
        }
    }

    pub fn build(
        self,
        config: FamilyConfig,
        subjects: Option<Box<dyn SubjectPort>>,
    ) -> Box<dyn StrategyFamily> {
        match self {
            StrategyKind::Combination => Box::new(CombinationFamily {
                codes: config.codes,
                tags: config.tags,
            }),
            StrategyKind::Index => Box::new(IndexFamily {
                benchmark: config.benchmark.unwrap_or_default(),
                tags: config.tags,
            }),
            StrategyKind::NewHigh => Box::new(NewHighFamily {
                subjects,
                tags: config.tags,
            }),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combination" => Ok(StrategyKind::Combination),
            "index" => Ok(StrategyKind::Index),
            "new_high" => Ok(StrategyKind::NewHigh),
            other => Err(format!(
                "unknown strategy kind '{other}' (expected combination, index or new_high)"
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Family inputs read from configuration.
#[derive(Debug, Clone, Default)]
pub struct FamilyConfig {
    pub codes: Vec<String>,
    pub tags: Vec<String>,
    pub benchmark: Option<String>,
}

fn gain_structural() -> StructuralConditions {
    StructuralConditions {
        taking: vec![Condition::daily(
            Operand::Gain,
            CompareOp::Gt,
            Operand::Constant(0.0),
        )],
        stop_loss: vec![Condition::daily(
            Operand::Gain,
            CompareOp::Lt,
            Operand::Constant(0.0),
        )],
        ..StructuralConditions::default()
    }
}

fn require_tags(tags: &[String]) -> Result<(), CombitraderError> {
    if tags.is_empty() {
        return Err(CombitraderError::ConfigMissing {
            section: "strategy".into(),
            key: "tags".into(),
        });
    }
    Ok(())
}

/// Fixed universe, profit/loss gated exits, no closing rule.
#[derive(Debug, Clone)]
pub struct CombinationFamily {
    pub codes: Vec<String>,
    pub tags: Vec<String>,
}

impl StrategyFamily for CombinationFamily {
    fn name(&self) -> &'static str {
        StrategyKind::Combination.name()
    }

    fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    fn subject(&self, _date: NaiveDate) -> Result<Vec<String>, CombitraderError> {
        Ok(self.codes.clone())
    }

    fn structural(&self) -> StructuralConditions {
        gain_structural()
    }

    fn pool(&self, decision: Decision) -> PoolSource {
        match decision {
            Decision::Closing => PoolSource::Fixed(vec![Condition::Never]),
            _ => PoolSource::Catalog,
        }
    }

    fn validate(&self) -> Result<(), CombitraderError> {
        if self.codes.is_empty() {
            return Err(CombitraderError::ConfigMissing {
                section: "backtest".into(),
                key: "codes".into(),
            });
        }
        require_tags(&self.tags)
    }
}

/// Trades a single benchmark series, reading it as an extra leg too.
#[derive(Debug, Clone)]
pub struct IndexFamily {
    pub benchmark: String,
    pub tags: Vec<String>,
}

impl StrategyFamily for IndexFamily {
    fn name(&self) -> &'static str {
        StrategyKind::Index.name()
    }

    fn tags(&self) -> Vec<String> {
        let mut tags = self.tags.clone();
        if !tags.contains(&self.benchmark) {
            tags.push(self.benchmark.clone());
        }
        tags
    }

    fn subject(&self, _date: NaiveDate) -> Result<Vec<String>, CombitraderError> {
        Ok(vec![self.benchmark.clone()])
    }

    fn structural(&self) -> StructuralConditions {
        gain_structural()
    }

    fn pool(&self, decision: Decision) -> PoolSource {
        match decision {
            Decision::Closing => PoolSource::Fixed(vec![Condition::Never]),
            _ => PoolSource::Catalog,
        }
    }

    fn validate(&self) -> Result<(), CombitraderError> {
        if self.benchmark.is_empty() {
            return Err(CombitraderError::ConfigMissing {
                section: "strategy".into(),
                key: "benchmark".into(),
            });
        }
        require_tags(&self.tags)
    }
}

/// Daily new-high portfolio, exits once the breakout stalls.
pub struct NewHighFamily {
    pub subjects: Option<Box<dyn SubjectPort>>,
    pub tags: Vec<String>,
}

impl NewHighFamily {
    /// No new high in the last 2 bars while losing, or few highs over 10 bars.
    pub fn break_precondition() -> Condition {
        let recent_high = Operand::Max {
            column: "high_update".into(),
            bars: 2,
        };
        let high_count = Operand::Sum {
            column: "high_update".into(),
            bars: 10,
        };
        let zero = || Operand::Constant(0.0);
        Condition::Any(vec![
            Condition::All(vec![
                Condition::daily(recent_high, CompareOp::Eq, zero()),
                Condition::Any(vec![
                    Condition::daily(Operand::Gain, CompareOp::Le, zero()),
                    Condition::daily(Operand::TradeGain, CompareOp::Le, zero()),
                ]),
                Condition::daily(Operand::Held, CompareOp::Ge, zero()),
            ]),
            Condition::daily(high_count, CompareOp::Le, Operand::Constant(5.0)),
        ])
    }
}

impl StrategyFamily for NewHighFamily {
    fn name(&self) -> &'static str {
        StrategyKind::NewHigh.name()
    }

    fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    fn subject(&self, date: NaiveDate) -> Result<Vec<String>, CombitraderError> {
        match &self.subjects {
            Some(source) => source.subject(date),
            None => Err(CombitraderError::ConfigMissing {
                section: "strategy".into(),
                key: "portfolio_dir".into(),
            }),
        }
    }

    fn structural(&self) -> StructuralConditions {
        let held = || Condition::daily(Operand::Held, CompareOp::Gt, Operand::Constant(0.0));
        StructuralConditions {
            new: vec![
                Condition::threshold(
                    &Leg::Index(NEW_SCORE_TAG.into()),
                    "score",
                    CompareOp::Gt,
                    -400.0,
                ),
                Condition::threshold(&Leg::Daily, "stop_low", CompareOp::Eq, 0.0),
            ],
            taking: vec![held()],
            stop_loss: vec![held()],
            closing: vec![Self::break_precondition()],
        }
    }

    fn pool(&self, _decision: Decision) -> PoolSource {
        PoolSource::Catalog
    }

    fn validate(&self) -> Result<(), CombitraderError> {
        if self.subjects.is_none() {
            return Err(CombitraderError::ConfigMissing {
                section: "strategy".into(),
                key: "portfolio_dir".into(),
            });
        }
        require_tags(&self.tags)
    }
}

/// Runs another family against one fixed instrument.
///
/// Everything but the universe comes from the wrapped family, so a pinned
/// code also stands in for a missing `codes` list or portfolio directory.
pub struct PinnedFamily {
    pub inner: Box<dyn StrategyFamily>,
    pub code: String,
}

impl StrategyFamily for PinnedFamily {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn tags(&self) -> Vec<String> {
        self.inner.tags()
    }

    fn subject(&self, _date: NaiveDate) -> Result<Vec<String>, CombitraderError> {
        Ok(vec![self.code.clone()])
    }

    fn structural(&self) -> StructuralConditions {
        self.inner.structural()
    }

    fn pool(&self, decision: Decision) -> PoolSource {
        self.inner.pool(decision)
    }

    fn validate(&self) -> Result<(), CombitraderError> {
        if self.code.is_empty() {
            return Err(CombitraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "code".into(),
                reason: "empty instrument code".into(),
            });
        }
        match self.inner.validate() {
            Err(CombitraderError::ConfigMissing { key, .. })
                if key == "codes" || key == "portfolio_dir" =>
            {
                require_tags(&self.inner.tags())
            }
            other => other,
        }
    }
}

/// How catalog pools are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSetting {
    pub seeds: Vec<u64>,
    pub condition_size: usize,
    pub weights: BTreeMap<Decision, Weights>,
}

impl Default for SelectionSetting {
    fn default() -> Self {
        Self {
            seeds: vec![0],
            condition_size: 5,
            weights: BTreeMap::new(),
        }
    }
}

/// A family with its pools fixed; turns genomes into strategies.
pub struct StrategyFactory {
    family: Box<dyn StrategyFamily>,
    selection: SelectionSetting,
    pools: Vec<Vec<Condition>>,
    selected: BTreeMap<Decision, Vec<usize>>,
    spaces: Vec<SearchSpace>,
}

impl StrategyFactory {
    pub fn new(
        family: Box<dyn StrategyFamily>,
        catalog: &dyn ConditionCatalog,
        selection: SelectionSetting,
    ) -> Result<Self, CombitraderError> {
        if selection.seeds.is_empty() {
            return Err(CombitraderError::ConfigMissing {
                section: "strategy".into(),
                key: "seeds".into(),
            });
        }
        let all = catalog.catalog(&family.tags());

        // One selector per seed, drawing the decision points in order.
        let mut draws: Vec<Vec<Vec<usize>>> = vec![Vec::new(); Decision::ALL.len()];
        for &seed in &selection.seeds {
            let mut selector = ConditionSelector::new(seed);
            for d in Decision::ALL {
                if family.pool(d) == PoolSource::Catalog {
                    let weights = selection.weights.get(&d).cloned().unwrap_or_default();
                    draws[d.index()].push(selector.select(
                        all.len(),
                        selection.condition_size,
                        &weights,
                    ));
                }
            }
        }

        let mut pools = Vec::with_capacity(Decision::ALL.len());
        let mut selected = BTreeMap::new();
        let mut spaces = Vec::with_capacity(Decision::ALL.len());
        for (d, decision_draws) in Decision::ALL.into_iter().zip(draws) {
            let pool = match family.pool(d) {
                PoolSource::Fixed(conditions) => conditions,
                PoolSource::Catalog => {
                    let indices = merge_draws(decision_draws);
                    let pool = indices.iter().map(|&i| all[i].clone()).collect();
                    selected.insert(d, indices);
                    pool
                }
            };
            spaces.push(SearchSpace::new(pool.len())?);
            pools.push(pool);
        }

        Ok(Self {
            family,
            selection,
            pools,
            selected,
            spaces,
        })
    }

    pub fn family(&self) -> &dyn StrategyFamily {
        self.family.as_ref()
    }

    pub fn pool(&self, decision: Decision) -> &[Condition] {
        &self.pools[decision.index()]
    }

    pub fn space(&self, decision: Decision) -> &SearchSpace {
        &self.spaces[decision.index()]
    }

    /// Search-space size per decision point, in `Decision::ALL` order.
    pub fn ranges(&self) -> [u64; 4] {
        Decision::ALL.map(|d| self.space(d).size())
    }

    pub fn create(&self, setting: &StrategySetting) -> Result<Strategy, SearchSpaceError> {
        let group = |d: Decision| -> Result<RuleGroup, SearchSpaceError> {
            let combination = self.space(d).decode(setting.ordinal(d))?;
            Ok(RuleGroup::from_combination(self.pool(d), &combination))
        };
        Ok(Strategy {
            new: group(Decision::New)?,
            taking: group(Decision::Taking)?,
            stop_loss: group(Decision::StopLoss)?,
            closing: group(Decision::Closing)?,
            structural: self.family.structural(),
        })
    }

    pub fn describe(
        &self,
        setting: &StrategySetting,
    ) -> Result<Vec<(Decision, CombinationDescription)>, SearchSpaceError> {
        Decision::ALL
            .into_iter()
            .map(|d| {
                let desc = self.space(d).describe(setting.ordinal(d), self.pool(d))?;
                Ok((d, desc))
            })
            .collect()
    }

    pub fn record(&self, setting: &StrategySetting) -> GenomeRecord {
        GenomeRecord {
            setting: *setting,
            seeds: self.selection.seeds.clone(),
            weights: self.selection.weights.clone(),
            kind: self.family.name().to_string(),
            selected: self.selected.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::StandardCatalog;

    fn combination_family() -> Box<dyn StrategyFamily> {
        StrategyKind::Combination.build(
            FamilyConfig {
                codes: vec!["7203".into()],
                tags: vec!["daily".into()],
                benchmark: None,
            },
            None,
        )
    }

    struct Fixed(Vec<String>);

    impl SubjectPort for Fixed {
        fn subject(&self, _date: NaiveDate) -> Result<Vec<String>, CombitraderError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn pinned_family_overrides_universe_only() {
        let inner = StrategyKind::NewHigh.build(
            FamilyConfig {
                tags: vec!["daily".into()],
                ..FamilyConfig::default()
            },
            Some(Box::new(Fixed(vec!["6758".into(), "9984".into()]))),
        );
        let structural = inner.structural();
        let pinned = PinnedFamily {
            inner,
            code: "7203".into(),
        };
        assert_eq!(pinned.name(), "new_high");
        let day = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(pinned.subject(day).unwrap(), vec!["7203".to_string()]);
        assert_eq!(pinned.structural(), structural);
        assert!(pinned.validate().is_ok());
    }

    #[test]
    fn pinned_family_stands_in_for_missing_universe() {
        let inner = StrategyKind::NewHigh.build(
            FamilyConfig {
                tags: vec!["daily".into()],
                ..FamilyConfig::default()
            },
            None,
        );
        assert!(inner.validate().is_err());
        let pinned = PinnedFamily {
            inner,
            code: "7203".into(),
        };
        assert!(pinned.validate().is_ok());

        // still needs tags and a benchmark leg
        let untagged = PinnedFamily {
            inner: StrategyKind::NewHigh.build(FamilyConfig::default(), None),
            code: "7203".into(),
        };
        assert!(untagged.validate().is_err());
        let no_benchmark = PinnedFamily {
            inner: StrategyKind::Index.build(
                FamilyConfig {
                    tags: vec!["daily".into()],
                    ..FamilyConfig::default()
                },
                None,
            ),
            code: "7203".into(),
        };
        assert!(no_benchmark.validate().is_err());
    }

    #[test]
    fn kind_parses_names() {
        for kind in [StrategyKind::Combination, StrategyKind::Index, StrategyKind::NewHigh] {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!("trend".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn factory_sizes_follow_pools() {
        let factory =
            StrategyFactory::new(combination_family(), &StandardCatalog, SelectionSetting::default())
                .unwrap();
        assert_eq!(factory.ranges(), [242, 242, 242, 2]);
        assert_eq!(factory.pool(Decision::Closing), &[Condition::Never]);
    }

    #[test]
    fn factory_is_reproducible() {
        let a = StrategyFactory::new(combination_family(), &StandardCatalog, SelectionSetting::default())
            .unwrap();
        let b = StrategyFactory::new(combination_family(), &StandardCatalog, SelectionSetting::default())
            .unwrap();
        let setting = StrategySetting {
            new: 17,
            taking: 3,
            stop_loss: 200,
            closing: 1,
        };
        assert_eq!(a.create(&setting).unwrap(), b.create(&setting).unwrap());
        assert_eq!(a.record(&setting), b.record(&setting));
    }

    #[test]
    fn extra_seeds_grow_pools() {
        let selection = SelectionSetting {
            seeds: vec![1, 2],
            condition_size: 3,
            weights: BTreeMap::new(),
        };
        let factory = StrategyFactory::new(combination_family(), &StandardCatalog, selection).unwrap();
        let n = factory.pool(Decision::New).len();
        assert!((3..=6).contains(&n));
        assert_eq!(factory.record(&StrategySetting::default()).selected[&Decision::New].len(), n);
    }

    #[test]
    fn out_of_range_genome_is_an_error() {
        let factory =
            StrategyFactory::new(combination_family(), &StandardCatalog, SelectionSetting::default())
                .unwrap();
        let setting = StrategySetting {
            new: 0,
            taking: 0,
            stop_loss: 0,
            closing: 2,
        };
        assert_eq!(
            factory.create(&setting),
            Err(SearchSpaceError::OrdinalOutOfRange { ordinal: 2, size: 2 })
        );
    }

    #[test]
    fn oversized_pool_is_rejected() {
        let selection = SelectionSetting {
            seeds: vec![0],
            condition_size: 41,
            weights: BTreeMap::new(),
        };
        let err = StrategyFactory::new(combination_family(), &StandardCatalog, selection)
            .err()
            .unwrap();
        assert!(matches!(err, CombitraderError::SearchSpace(_)));
    }

    #[test]
    fn families_validate_their_collaborators() {
        let missing_codes = StrategyKind::Combination.build(
            FamilyConfig {
                tags: vec!["daily".into()],
                ..FamilyConfig::default()
            },
            None,
        );
        assert!(missing_codes.validate().is_err());

        let new_high = StrategyKind::NewHigh.build(
            FamilyConfig {
                tags: vec!["daily".into()],
                ..FamilyConfig::default()
            },
            None,
        );
        assert!(new_high.validate().is_err());
        assert!(new_high.subject(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()).is_err());

        let new_high = StrategyKind::NewHigh.build(
            FamilyConfig {
                tags: vec!["daily".into()],
                ..FamilyConfig::default()
            },
            Some(Box::new(Fixed(vec!["1301".into()]))),
        );
        assert!(new_high.validate().is_ok());
        assert_eq!(
            new_high
                .subject(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap())
                .unwrap(),
            vec!["1301"]
        );
    }

    #[test]
    fn index_family_adds_benchmark_leg() {
        let family = StrategyKind::Index.build(
            FamilyConfig {
                tags: vec!["daily".into()],
                benchmark: Some("nikkei".into()),
                ..FamilyConfig::default()
            },
            None,
        );
        assert_eq!(family.tags(), vec!["daily", "nikkei"]);
        assert_eq!(
            family.subject(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()).unwrap(),
            vec!["nikkei"]
        );
    }

    #[test]
    fn new_high_structure_reads_new_score_leg() {
        let family = NewHighFamily {
            subjects: None,
            tags: vec!["daily".into()],
        };
        let strategy = Strategy {
            new: RuleGroup::default(),
            taking: RuleGroup::default(),
            stop_loss: RuleGroup::default(),
            closing: RuleGroup::default(),
            structural: family.structural(),
        };
        assert!(strategy.index_legs().contains(NEW_SCORE_TAG));
        assert_eq!(
            NewHighFamily::break_precondition().to_string(),
            "ANY(ALL(MAX(high_update, 2) == 0, ANY($gain <= 0, $trade_gain <= 0), $held >= 0), SUM(high_update, 10) <= 5)"
        );
    }
}
