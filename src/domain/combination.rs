//! Combinatorial search space over a decision point's condition pool.
//!
//! Each of the `N` pooled conditions is either absent, required or optional,
//! so a combination is a base-3 assignment of `N` digits. The all-absent
//! assignment can never fire and is excluded, leaving `3^N - 1` combinations.
//! Ordinal `o` maps to assignment `o + 1` with digit `i` (least significant
//! first) describing condition `i`:
//!
//! | digit | meaning  |
//! |-------|----------|
//! | 0     | absent   |
//! | 1     | required |
//! | 2     | optional |
//!
//! Required and optional sets are therefore disjoint, and the mapping depends
//! only on `(ordinal, N)`, so persisted genomes replay identically.

use crate::domain::condition::Condition;
use crate::domain::error::SearchSpaceError;
use std::fmt;

/// Largest pool whose combination count fits in `u64`.
pub const MAX_CONDITIONS: usize = 40;

/// A decoded `(required, optional)` pair of pool indices, each ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Combination {
    pub required: Vec<usize>,
    pub optional: Vec<usize>,
}

/// Every required member holds and at least one optional member does.
///
/// An empty optional group is never satisfied. Evaluation short-circuits
/// in order: required first, then optional.
pub fn group_satisfied<T>(
    required: &[T],
    optional: &[T],
    mut holds: impl FnMut(&T) -> bool,
) -> bool {
    !optional.is_empty() && required.iter().all(&mut holds) && optional.iter().any(holds)
}

impl Combination {
    /// [`group_satisfied`] over pool indices.
    pub fn is_satisfied(&self, mut holds: impl FnMut(usize) -> bool) -> bool {
        group_satisfied(&self.required, &self.optional, |&i| holds(i))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSpace {
    n: usize,
    size: u64,
}

impl SearchSpace {
    pub fn new(n: usize) -> Result<Self, SearchSpaceError> {
        if n > MAX_CONDITIONS {
            return Err(SearchSpaceError::TooManyConditions {
                n,
                max: MAX_CONDITIONS,
            });
        }
        Ok(Self {
            n,
            size: 3u64.pow(n as u32) - 1,
        })
    }

    /// Number of pooled conditions.
    pub fn conditions(&self) -> usize {
        self.n
    }

    /// Number of valid ordinals.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn decode(&self, ordinal: u64) -> Result<Combination, SearchSpaceError> {
        if ordinal >= self.size {
            return Err(SearchSpaceError::OrdinalOutOfRange {
                ordinal,
                size: self.size,
            });
        }
        let mut assignment = ordinal + 1;
        let mut combination = Combination::default();
        for i in 0..self.n {
            match assignment % 3 {
                1 => combination.required.push(i),
                2 => combination.optional.push(i),
                _ => {}
            }
            assignment /= 3;
        }
        Ok(combination)
    }

    /// Inverse of [`decode`](Self::decode).
    pub fn encode(&self, combination: &Combination) -> Result<u64, SearchSpaceError> {
        let invalid = |reason: String| SearchSpaceError::InvalidCombination { reason };
        let mut digits = vec![0u64; self.n];
        for (group, digit) in [(&combination.required, 1), (&combination.optional, 2)] {
            for &i in group {
                if i >= self.n {
                    return Err(invalid(format!(
                        "index {i} outside pool of {}",
                        self.n
                    )));
                }
                if digits[i] != 0 {
                    return Err(invalid(format!("index {i} appears more than once")));
                }
                digits[i] = digit;
            }
        }
        let assignment = digits.iter().rev().fold(0u64, |acc, &d| acc * 3 + d);
        if assignment == 0 {
            return Err(invalid("required and optional are both empty".to_string()));
        }
        Ok(assignment - 1)
    }

    /// Render the combination at `ordinal` against the pooled conditions.
    pub fn describe(
        &self,
        ordinal: u64,
        pool: &[Condition],
    ) -> Result<CombinationDescription, SearchSpaceError> {
        let combination = self.decode(ordinal)?;
        let render = |indices: &[usize]| {
            indices
                .iter()
                .map(|&i| {
                    pool.get(i)
                        .map(ToString::to_string)
                        .unwrap_or_else(|| format!("#{i}"))
                })
                .collect()
        };
        Ok(CombinationDescription {
            ordinal,
            required: render(&combination.required),
            optional: render(&combination.optional),
        })
    }
}

/// Human-readable form of one combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationDescription {
    pub ordinal: u64,
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

impl fmt::Display for CombinationDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#{}", self.ordinal)?;
        writeln!(f, "  required:")?;
        for c in &self.required {
            writeln!(f, "    {c}")?;
        }
        writeln!(f, "  optional:")?;
        for c in &self.optional {
            writeln!(f, "    {c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sizes() {
        assert_eq!(SearchSpace::new(0).unwrap().size(), 0);
        assert_eq!(SearchSpace::new(1).unwrap().size(), 2);
        assert_eq!(SearchSpace::new(2).unwrap().size(), 8);
        assert_eq!(SearchSpace::new(5).unwrap().size(), 242);
        assert_eq!(
            SearchSpace::new(MAX_CONDITIONS).unwrap().size(),
            12_157_665_459_056_928_800
        );
    }

    #[test]
    fn too_many_conditions() {
        assert_eq!(
            SearchSpace::new(41),
            Err(SearchSpaceError::TooManyConditions { n: 41, max: 40 })
        );
    }

    #[test]
    fn decode_single_condition() {
        let space = SearchSpace::new(1).unwrap();
        assert_eq!(
            space.decode(0).unwrap(),
            Combination {
                required: vec![0],
                optional: vec![],
            }
        );
        assert_eq!(
            space.decode(1).unwrap(),
            Combination {
                required: vec![],
                optional: vec![0],
            }
        );
    }

    #[test]
    fn decode_is_bijective_for_small_pool() {
        let space = SearchSpace::new(4).unwrap();
        let all: HashSet<Combination> = (0..space.size())
            .map(|o| space.decode(o).unwrap())
            .collect();
        assert_eq!(all.len() as u64, space.size());
        assert!(!all.contains(&Combination::default()));
        for c in &all {
            assert!(c.required.iter().all(|i| !c.optional.contains(i)));
        }
    }

    #[test]
    fn encode_inverts_decode() {
        let space = SearchSpace::new(3).unwrap();
        for o in 0..space.size() {
            assert_eq!(space.encode(&space.decode(o).unwrap()).unwrap(), o);
        }
    }

    #[test]
    fn encode_rejects_invalid() {
        let space = SearchSpace::new(3).unwrap();
        assert!(space.encode(&Combination::default()).is_err());
        let overlap = Combination {
            required: vec![1],
            optional: vec![1],
        };
        assert!(space.encode(&overlap).is_err());
        let outside = Combination {
            required: vec![],
            optional: vec![3],
        };
        assert!(space.encode(&outside).is_err());
    }

    #[test]
    fn out_of_range_is_an_error() {
        let space = SearchSpace::new(2).unwrap();
        assert_eq!(
            space.decode(8),
            Err(SearchSpaceError::OrdinalOutOfRange { ordinal: 8, size: 8 })
        );
    }

    #[test]
    fn satisfaction_semantics() {
        let c = Combination {
            required: vec![0, 1],
            optional: vec![2, 3],
        };
        let truth = [true, true, false, true];
        assert!(c.is_satisfied(|i| truth[i]));
        let truth = [true, false, true, true];
        assert!(!c.is_satisfied(|i| truth[i]));
        let truth = [true, true, false, false];
        assert!(!c.is_satisfied(|i| truth[i]));

        let required_only = Combination {
            required: vec![0],
            optional: vec![],
        };
        assert!(!required_only.is_satisfied(|_| true));

        let optional_only = Combination {
            required: vec![],
            optional: vec![0],
        };
        assert!(optional_only.is_satisfied(|_| true));
    }

    #[test]
    fn group_rule_matches_index_rule() {
        let pool = [true, false, true, true];
        let holds = |c: &bool| *c;
        for ordinal in 0..SearchSpace::new(4).unwrap().size() {
            let c = SearchSpace::new(4).unwrap().decode(ordinal).unwrap();
            let required: Vec<bool> = c.required.iter().map(|&i| pool[i]).collect();
            let optional: Vec<bool> = c.optional.iter().map(|&i| pool[i]).collect();
            assert_eq!(
                group_satisfied(&required, &optional, holds),
                c.is_satisfied(|i| pool[i]),
                "ordinal {ordinal}"
            );
        }
    }

    #[test]
    fn group_rule_stops_at_first_failed_required() {
        let mut seen = Vec::new();
        let ok = group_satisfied(&[1, 2, 3], &[4], |&i| {
            seen.push(i);
            i != 2
        });
        assert!(!ok);
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn describe_renders_condition_text() {
        let pool = vec![Condition::Always, Condition::Never];
        let space = SearchSpace::new(2).unwrap();
        // assignment 7 = digits [1, 2]
        let desc = space.describe(6, &pool).unwrap();
        assert_eq!(desc.required, vec!["true"]);
        assert_eq!(desc.optional, vec!["false"]);
        assert!(desc.to_string().contains("required:\n    true"));
    }
}
