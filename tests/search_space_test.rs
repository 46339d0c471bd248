//! Property tests for the combination search space and pool selection.
//!
//! Uses proptest to verify:
//! 1. Ordinal and combination are a bijection for every pool size
//! 2. Decoded groups are disjoint and stay inside the pool
//! 3. Ordinals past the end of the space are rejected
//! 4. Pool selection depends only on the seed

use combitrader::domain::catalog::{ConditionCatalog, StandardCatalog};
use combitrader::domain::combination::{Combination, SearchSpace};
use combitrader::domain::error::SearchSpaceError;
use combitrader::domain::genome::{Decision, StrategySetting};
use combitrader::domain::selection::{ConditionSelector, Weights, merge_draws};
use combitrader::domain::strategy::{CombinationFamily, SelectionSetting, StrategyFactory};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_space_and_ordinal() -> impl Strategy<Value = (usize, u64)> {
    (1usize..=8).prop_flat_map(|n| (Just(n), 0..(3u64.pow(n as u32) - 1)))
}

fn family() -> CombinationFamily {
    CombinationFamily {
        codes: vec!["7203".into()],
        tags: vec!["daily".into()],
    }
}

// ── 1. Bijection ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn decode_then_encode_is_identity((n, ordinal) in arb_space_and_ordinal()) {
        let space = SearchSpace::new(n).unwrap();
        let combination = space.decode(ordinal).unwrap();
        prop_assert_eq!(space.encode(&combination).unwrap(), ordinal);
    }

    #[test]
    fn decoded_groups_are_disjoint_and_in_pool((n, ordinal) in arb_space_and_ordinal()) {
        let combination = SearchSpace::new(n).unwrap().decode(ordinal).unwrap();
        let required: BTreeSet<usize> = combination.required.iter().copied().collect();
        let optional: BTreeSet<usize> = combination.optional.iter().copied().collect();

        prop_assert!(required.is_disjoint(&optional));
        prop_assert!(!(required.is_empty() && optional.is_empty()));
        prop_assert!(required.iter().chain(&optional).all(|&i| i < n));
        // ascending, no duplicates
        prop_assert_eq!(required.len(), combination.required.len());
        prop_assert!(combination.required.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(combination.optional.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ordinal_past_end_is_rejected(n in 0usize..=8, past in 0u64..100) {
        let space = SearchSpace::new(n).unwrap();
        let ordinal = space.size() + past;
        prop_assert_eq!(
            space.decode(ordinal),
            Err(SearchSpaceError::OrdinalOutOfRange { ordinal, size: space.size() })
        );
    }

    #[test]
    fn empty_optional_never_satisfied(required in prop::collection::vec(0usize..8, 0..4)) {
        let combination = Combination { required, optional: vec![] };
        prop_assert!(!combination.is_satisfied(|_| true));
    }

    #[test]
    fn selection_depends_only_on_seed(seed in any::<u64>(), noise in 0usize..50) {
        let w = Weights::new();
        let a = ConditionSelector::new(seed).select(60, 8, &w);
        let mut other = ConditionSelector::new(seed.wrapping_add(1));
        other.select(60, noise, &w);
        let b = ConditionSelector::new(seed).select(60, 8, &w);
        prop_assert_eq!(a, b);
    }
}

// ── 2. Exhaustive checks on small pools ──────────────────────────────

mod exhaustive {
    use super::*;

    #[test]
    fn every_ordinal_decodes_to_a_distinct_combination() {
        for n in 1..=6 {
            let space = SearchSpace::new(n).unwrap();
            let all: HashSet<Combination> = (0..space.size())
                .map(|o| space.decode(o).unwrap())
                .collect();
            assert_eq!(all.len() as u64, space.size(), "n = {n}");
        }
    }

    #[test]
    fn three_condition_space_matches_base_three_digits() {
        let space = SearchSpace::new(3).unwrap();
        assert_eq!(space.size(), 26);
        // ordinal 0 is assignment 1: condition 0 required
        assert_eq!(
            space.decode(0).unwrap(),
            Combination {
                required: vec![0],
                optional: vec![]
            }
        );
        // assignment 26 = 2 + 2*3 + 2*9: everything optional
        assert_eq!(
            space.decode(25).unwrap(),
            Combination {
                required: vec![],
                optional: vec![0, 1, 2]
            }
        );
        // assignment 5 = 2 + 1*3
        assert_eq!(
            space.decode(4).unwrap(),
            Combination {
                required: vec![1],
                optional: vec![0]
            }
        );
    }

    #[test]
    fn empty_pool_has_no_combinations() {
        let space = SearchSpace::new(0).unwrap();
        assert_eq!(space.size(), 0);
        assert!(space.decode(0).is_err());
    }
}

// ── 3. Factory reproducibility ───────────────────────────────────────

mod factory {
    use super::*;

    fn build(seeds: Vec<u64>) -> StrategyFactory {
        let selection = SelectionSetting {
            seeds,
            ..SelectionSetting::default()
        };
        StrategyFactory::new(Box::new(family()), &StandardCatalog, selection).unwrap()
    }

    #[test]
    fn same_seed_same_pools() {
        let a = build(vec![11]);
        let b = build(vec![11]);
        for d in Decision::ALL {
            assert_eq!(a.pool(d), b.pool(d), "{d}");
        }
        assert_eq!(a.ranges(), b.ranges());
    }

    #[test]
    fn same_genome_same_strategy() {
        let setting = StrategySetting {
            new: 7,
            taking: 100,
            stop_loss: 3,
            closing: 1,
        };
        let a = build(vec![5, 6]).create(&setting).unwrap();
        let b = build(vec![5, 6]).create(&setting).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn extra_seed_only_grows_pool() {
        let one = build(vec![1]);
        let two = build(vec![1, 2]);
        for d in [Decision::New, Decision::Taking, Decision::StopLoss] {
            let first = one.pool(d);
            let merged = two.pool(d);
            assert!(merged.len() >= first.len());
            assert_eq!(&merged[..first.len()], first);
        }
    }

    #[test]
    fn pools_draw_from_tagged_catalog() {
        let catalog = StandardCatalog.catalog(&family().tags);
        let factory = build(vec![3]);
        for d in [Decision::New, Decision::Taking, Decision::StopLoss] {
            assert!(factory.pool(d).iter().all(|c| catalog.contains(c)));
        }
    }

    #[test]
    fn merge_keeps_first_seen_order() {
        assert_eq!(merge_draws([vec![4, 1], vec![1, 9, 4]]), vec![4, 1, 9]);
    }

    #[test]
    fn out_of_range_genome_is_rejected() {
        let factory = build(vec![0]);
        let setting = StrategySetting {
            new: factory.ranges()[Decision::New.index()],
            ..StrategySetting::default()
        };
        assert!(factory.create(&setting).is_err());
    }
}
