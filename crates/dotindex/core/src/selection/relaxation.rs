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

//! Relaxation
//!
//! Starts from the union of the indexes the optimizer uses per query when every possible
//! index exists. While that configuration exceeds the storage budget, it is relaxed by the
//! transformation with the lowest penalty, i.e. cost increase per byte saved. Savings are
//! capped at the remaining excess so that large and small moves compare fairly, and moves
//! that also lower the cost get a negative penalty that grows with the savings.

use dotindex_common::units::mb_to_b;
use dotindex_common::{Column, Index, Workload, indexes_by_table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

use super::virtual_indexes::exploit_virtual_indexes;
use super::{AlgorithmBase, SelectionAlgorithm};
use crate::connector::DatabaseConnector;
use crate::cost_evaluation::{CostEvaluation, CostStatistics};
use crate::error::{SelectionError, SelectionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transformation {
    /// Drop one index.
    Removal,
    /// Replace a multi-column index by one of its proper prefixes.
    Prefixing,
    /// Replace two indexes on one table by a single index covering both.
    Merging,
    /// Replace two indexes on one table by their shared columns plus the residuals.
    Splitting,
}

impl Transformation {
    pub const ALL: [Transformation; 4] = [Transformation::Removal, Transformation::Prefixing, Transformation::Merging, Transformation::Splitting];
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transformation::Removal => "removal",
            Transformation::Prefixing => "prefixing",
            Transformation::Merging => "merging",
            Transformation::Splitting => "splitting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelaxationConfig {
    #[serde(alias = "max_index_width")]
    pub max_index_columns: usize,
    #[serde(alias = "budget", alias = "budget_MB")]
    pub budget_mb: f64,
    pub transformations: Vec<Transformation>,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            max_index_columns: 3,
            budget_mb: 500.0,
            transformations: Transformation::ALL.to_vec(),
        }
    }
}

impl RelaxationConfig {
    pub fn validate(&self) -> SelectionResult<()> {
        if self.max_index_columns == 0 {
            return Err(SelectionError::InvalidConfiguration("max_index_columns must be at least 1".to_string()));
        }
        if !self.budget_mb.is_finite() || self.budget_mb < 0.0 {
            return Err(SelectionError::InvalidConfiguration("budget_mb must be a non-negative number".to_string()));
        }
        if self.transformations.is_empty() {
            return Err(SelectionError::InvalidConfiguration("At least one transformation is required".to_string()));
        }
        Ok(())
    }

    fn enables(&self, transformation: Transformation) -> bool {
        self.transformations.contains(&transformation)
    }
}

pub struct RelaxationAlgorithm<'a, C: DatabaseConnector + ?Sized> {
    base: AlgorithmBase<'a, C>,
    config: RelaxationConfig,
}

impl<'a, C: DatabaseConnector + ?Sized> RelaxationAlgorithm<'a, C> {
    pub fn new(connector: &'a mut C, config: RelaxationConfig) -> SelectionResult<Self> {
        config.validate()?;
        Ok(Self {
            base: AlgorithmBase::new("relaxation", connector)?,
            config,
        })
    }
}

impl<C: DatabaseConnector + ?Sized> SelectionAlgorithm for RelaxationAlgorithm<'_, C> {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn calculate_best_indexes(&mut self, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
        info!("Parameters: {:?}", self.config);
        let config = &self.config;
        self.base.run(workload, |evaluation| relax(config, evaluation, workload))
    }

    fn cost_statistics(&self) -> CostStatistics {
        self.base.statistics()
    }
}

struct Relaxed {
    indexes: BTreeSet<Index>,
    cost: f64,
    size: u64,
    penalty: f64,
}

fn relax<C: DatabaseConnector + ?Sized>(config: &RelaxationConfig, evaluation: &mut CostEvaluation<'_, C>, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
    let (_, candidates) = exploit_virtual_indexes(evaluation, workload, config.max_index_columns)?;
    let budget = mb_to_b(config.budget_mb) as u64;

    let mut cp = candidates;
    let mut cp_cost = evaluation.calculate_cost(workload, &cp, true)?;
    let mut cp_size = evaluation.total_size(&cp)?;
    info!("Initial configuration: {} indexes, {} bytes, cost {}", cp.len(), cp_size, cp_cost);

    while cp_size > budget {
        let mut best: Option<Relaxed> = None;

        for relaxed in relaxed_configurations(config, &cp)? {
            if relaxed == cp {
                continue;
            }

            let relaxed_cost = evaluation.calculate_cost(workload, &relaxed, true)?;
            let relaxed_size = evaluation.total_size(&relaxed)?;
            if relaxed_size >= cp_size {
                continue;
            }

            let relaxed_penalty = penalty(relaxed_cost - cp_cost, cp_size - relaxed_size, cp_size - budget);
            debug!("Relaxed configuration: {} bytes, cost {}, penalty {}", relaxed_size, relaxed_cost, relaxed_penalty);
            if best.as_ref().is_none_or(|best| relaxed_penalty < best.penalty) {
                best = Some(Relaxed {
                    indexes: relaxed,
                    cost: relaxed_cost,
                    size: relaxed_size,
                    penalty: relaxed_penalty,
                });
            }
        }

        let best = best.ok_or_else(|| SelectionError::InvalidState(format!("No transformation reduces the configuration of {cp_size} bytes")))?;
        info!("Relaxed to {} indexes, {} bytes, cost {}", best.indexes.len(), best.size, best.cost);
        cp = best.indexes;
        cp_cost = best.cost;
        cp_size = best.size;
    }

    Ok(cp)
}

/// Cost increase per byte saved. Savings beyond `excess` do not count, and a cost decrease
/// is multiplied by the savings so that it always beats any increase.
fn penalty(cost_increase: f64, storage_savings: u64, excess: u64) -> f64 {
    let capped_savings = storage_savings.min(excess) as f64;
    if cost_increase < 0.0 {
        cost_increase * capped_savings
    } else {
        cost_increase / capped_savings
    }
}

/// Every configuration one enabled transformation away from `cp`, in the order removal,
/// prefixing, merging, splitting.
fn relaxed_configurations(config: &RelaxationConfig, cp: &BTreeSet<Index>) -> SelectionResult<Vec<BTreeSet<Index>>> {
    let mut configurations = Vec::new();
    let replaced = |removed: &[&Index], added: Vec<Index>| -> BTreeSet<Index> { cp.iter().filter(|index| !removed.contains(index)).cloned().chain(added).collect() };

    if config.enables(Transformation::Removal) {
        for index in cp {
            configurations.push(replaced(&[index], Vec::new()));
        }
    }

    if config.enables(Transformation::Prefixing) {
        for index in cp {
            for width in 1..index.width() {
                if let Some(prefix) = index.prefix(width) {
                    configurations.push(replaced(&[index], vec![prefix]));
                }
            }
        }
    }

    if config.enables(Transformation::Merging) {
        for (first, second) in &same_table_pairs(cp) {
            let mut columns = first.columns().to_vec();
            columns.extend(second.columns().iter().filter(|column| !first.contains(column)).cloned());
            if columns.len() > config.max_index_columns {
                continue;
            }
            configurations.push(replaced(&[first, second], vec![Index::new(columns)?]));
        }
    }

    if config.enables(Transformation::Splitting) {
        for (first, second) in &same_table_pairs(cp) {
            let common: Vec<Column> = first.columns().iter().filter(|column| second.contains(column)).cloned().collect();
            if common.is_empty() {
                continue;
            }

            let mut added = vec![Index::new(common.clone())?];
            for index in [first, second] {
                let residual: Vec<Column> = index.columns().iter().filter(|column| !common.contains(column)).cloned().collect();
                if !residual.is_empty() {
                    added.push(Index::new(residual)?);
                }
            }
            configurations.push(replaced(&[first, second], added));
        }
    }

    Ok(configurations)
}

/// Ordered pairs of distinct indexes on the same table, table by table.
fn same_table_pairs(cp: &BTreeSet<Index>) -> Vec<(Index, Index)> {
    let mut pairs = Vec::new();
    for indexes in indexes_by_table(cp).values() {
        for first in indexes {
            for second in indexes.iter().filter(|second| *second != first) {
                pairs.push((first.clone(), second.clone()));
            }
        }
    }
    pairs
}
