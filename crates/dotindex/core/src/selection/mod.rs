// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Index selection algorithms
//!
//! Every algorithm owns one `CostEvaluation` for its whole run and is a pure client of
//! it. The shared lifecycle lives in `AlgorithmBase`: real indexes are dropped when the
//! algorithm is built, `calculate_best_indexes` may run once, and the evaluation is
//! completed on every exit path of that run.

pub mod baseline;
pub mod combinatorics;
pub mod drop_heuristic;
pub mod dta_anytime;
pub mod epic;
pub mod ibm;
pub mod microsoft;
pub mod relaxation;
pub mod virtual_indexes;

use dotindex_common::{Index, Workload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::connector::DatabaseConnector;
use crate::cost_evaluation::{CostEvaluation, CostStatistics};
use crate::error::{SelectionError, SelectionResult};

pub use baseline::{AllIndexesAlgorithm, NoIndexAlgorithm};
pub use drop_heuristic::{DropHeuristicAlgorithm, DropHeuristicConfig};
pub use dta_anytime::{DtaAnytimeAlgorithm, DtaAnytimeConfig};
pub use epic::{EpicAlgorithm, EpicConfig};
pub use ibm::{IbmAlgorithm, IbmConfig};
pub use microsoft::{MicrosoftAlgorithm, MicrosoftConfig};
pub use relaxation::{RelaxationAlgorithm, RelaxationConfig, Transformation};

/// Raw algorithm parameters as they appear in a run configuration.
pub type Parameters = serde_json::Map<String, Value>;

pub trait SelectionAlgorithm {
    fn name(&self) -> &'static str;

    /// Runs the search. An algorithm instance can only run once.
    fn calculate_best_indexes(&mut self, workload: &Workload) -> SelectionResult<BTreeSet<Index>>;

    fn cost_statistics(&self) -> CostStatistics;
}

/// Registry of the available algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    NoIndex,
    AllIndexes,
    DropHeuristic,
    Microsoft,
    Relaxation,
    Ibm,
    Epic,
    DtaAnytime,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 8] = [
        AlgorithmKind::NoIndex,
        AlgorithmKind::AllIndexes,
        AlgorithmKind::DropHeuristic,
        AlgorithmKind::Microsoft,
        AlgorithmKind::Relaxation,
        AlgorithmKind::Ibm,
        AlgorithmKind::Epic,
        AlgorithmKind::DtaAnytime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::NoIndex => "no_index",
            AlgorithmKind::AllIndexes => "all_indexes",
            AlgorithmKind::DropHeuristic => "drop_heuristic",
            AlgorithmKind::Microsoft => "microsoft",
            AlgorithmKind::Relaxation => "relaxation",
            AlgorithmKind::Ibm => "ibm",
            AlgorithmKind::Epic => "epic",
            AlgorithmKind::DtaAnytime => "dta_anytime",
        }
    }

    /// Builds the algorithm over `connector`, merging `parameters` over its defaults.
    pub fn create<'a, C: DatabaseConnector + ?Sized + 'a>(&self, connector: &'a mut C, parameters: &Parameters) -> SelectionResult<Box<dyn SelectionAlgorithm + 'a>> {
        Ok(match self {
            AlgorithmKind::NoIndex => Box::new(NoIndexAlgorithm::new(connector, parse_config(parameters)?)?),
            AlgorithmKind::AllIndexes => Box::new(AllIndexesAlgorithm::new(connector, parse_config(parameters)?)?),
            AlgorithmKind::DropHeuristic => Box::new(DropHeuristicAlgorithm::new(connector, parse_config(parameters)?)?),
            AlgorithmKind::Microsoft => Box::new(MicrosoftAlgorithm::new(connector, parse_config(parameters)?)?),
            AlgorithmKind::Relaxation => Box::new(RelaxationAlgorithm::new(connector, parse_config(parameters)?)?),
            AlgorithmKind::Ibm => Box::new(IbmAlgorithm::new(connector, parse_config(parameters)?)?),
            AlgorithmKind::Epic => Box::new(EpicAlgorithm::new(connector, parse_config(parameters)?)?),
            AlgorithmKind::DtaAnytime => Box::new(DtaAnytimeAlgorithm::new(connector, parse_config(parameters)?)?),
        })
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| SelectionError::InvalidConfiguration(format!("Unknown algorithm: {s}")))
    }
}

/// Deserializes an algorithm config from raw parameters. Missing keys take the defaults.
pub fn parse_config<T: DeserializeOwned>(parameters: &Parameters) -> SelectionResult<T> {
    serde_json::from_value(Value::Object(parameters.clone())).map_err(|e| SelectionError::InvalidConfiguration(e.to_string()))
}

/// Lifecycle shared by all algorithms.
pub(crate) struct AlgorithmBase<'a, C: DatabaseConnector + ?Sized> {
    name: &'static str,
    cost_evaluation: CostEvaluation<'a, C>,
    did_run: bool,
}

impl<'a, C: DatabaseConnector + ?Sized> AlgorithmBase<'a, C> {
    /// Drops existing real indexes so that estimates start from a clean baseline.
    pub(crate) fn new(name: &'static str, connector: &'a mut C) -> SelectionResult<Self> {
        debug!("Init selection algorithm {}", name);
        connector.drop_indexes()?;
        Ok(Self {
            name,
            cost_evaluation: CostEvaluation::new(connector),
            did_run: false,
        })
    }

    /// Runs `search` once and completes the cost estimation afterwards, also on failure.
    pub(crate) fn run<F>(&mut self, workload: &Workload, search: F) -> SelectionResult<BTreeSet<Index>>
    where
        F: FnOnce(&mut CostEvaluation<'a, C>) -> SelectionResult<BTreeSet<Index>>,
    {
        if self.did_run {
            return Err(SelectionError::InvalidState("Selection algorithm can only run once".to_string()));
        }
        self.did_run = true;

        info!("Calculating best indexes ({}) for {} queries", self.name, workload.len());
        let result = search(&mut self.cost_evaluation).map(|indexes| indexes.iter().map(|index| self.cost_evaluation.with_known_size(index)).collect::<BTreeSet<_>>());
        self.log_cache_hits();
        let completion = self.cost_evaluation.complete_cost_estimation();

        match (result, completion) {
            (Ok(indexes), Ok(())) => {
                info!("Selected {} indexes ({})", indexes.len(), self.name);
                Ok(indexes)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                warn!("Failed to drop simulated indexes after failed search: {}", cleanup);
                Err(e)
            }
        }
    }

    pub(crate) fn statistics(&self) -> CostStatistics {
        self.cost_evaluation.statistics()
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    fn log_cache_hits(&self) {
        let statistics = self.cost_evaluation.statistics();
        debug!("Total cost cache hits:\t{}", statistics.cache_hits);
        debug!("Total cost requests:\t\t{}", statistics.cost_requests);
        if let Some(ratio) = statistics.hit_ratio() {
            debug!("Cost cache hit ratio:\t{}%", ratio);
        }
    }
}
