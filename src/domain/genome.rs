//! Genome: one search-space ordinal per decision point.

use crate::domain::selection::Weights;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    New,
    Taking,
    StopLoss,
    Closing,
}

impl Decision {
    pub const ALL: [Decision; 4] = [
        Decision::New,
        Decision::Taking,
        Decision::StopLoss,
        Decision::Closing,
    ];

    /// Position in [`Decision::ALL`].
    pub fn index(self) -> usize {
        match self {
            Decision::New => 0,
            Decision::Taking => 1,
            Decision::StopLoss => 2,
            Decision::Closing => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Decision::New => "new",
            Decision::Taking => "taking",
            Decision::StopLoss => "stop_loss",
            Decision::Closing => "closing",
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decision::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| format!("unknown decision point '{s}'"))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySetting {
    pub new: u64,
    pub taking: u64,
    pub stop_loss: u64,
    pub closing: u64,
}

impl StrategySetting {
    /// Build from an optimizer's flat `[new, taking, stop_loss, closing]`.
    pub fn from_slice(params: &[u64]) -> Option<Self> {
        match params {
            [new, taking, stop_loss, closing] => Some(Self {
                new: *new,
                taking: *taking,
                stop_loss: *stop_loss,
                closing: *closing,
            }),
            _ => None,
        }
    }

    pub fn to_array(self) -> [u64; 4] {
        [self.new, self.taking, self.stop_loss, self.closing]
    }

    pub fn ordinal(&self, decision: Decision) -> u64 {
        match decision {
            Decision::New => self.new,
            Decision::Taking => self.taking,
            Decision::StopLoss => self.stop_loss,
            Decision::Closing => self.closing,
        }
    }
}

/// Persisted genome together with what selected its condition pools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord {
    pub setting: StrategySetting,
    #[serde(default)]
    pub seeds: Vec<u64>,
    #[serde(default)]
    pub weights: BTreeMap<Decision, Weights>,
    #[serde(default)]
    pub kind: String,
    /// Catalog indices pooled per decision point when the record was written.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selected: BTreeMap<Decision, Vec<usize>>,
}
