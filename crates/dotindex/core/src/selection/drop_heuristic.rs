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

//! Drop heuristic
//!
//! Starts from every single-column candidate and repeatedly removes the index whose
//! removal leaves the cheapest workload, until at most `max_indexes` are left or, with a
//! budget, until the remaining indexes fit into it. Each round costs one evaluation per
//! remaining index, which the cost cache amortizes.

use dotindex_common::units::mb_to_b;
use dotindex_common::{Index, Workload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::{AlgorithmBase, SelectionAlgorithm};
use crate::connector::DatabaseConnector;
use crate::cost_evaluation::{CostEvaluation, CostStatistics};
use crate::error::{SelectionError, SelectionResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DropHeuristicConfig {
    pub max_indexes: usize,
    /// Storage budget in MB. When set it replaces the index count as stop condition.
    #[serde(alias = "budget", alias = "budget_MB")]
    pub budget_mb: Option<f64>,
}

impl Default for DropHeuristicConfig {
    fn default() -> Self {
        Self {
            max_indexes: 15,
            budget_mb: None,
        }
    }
}

impl DropHeuristicConfig {
    pub fn validate(&self) -> SelectionResult<()> {
        if self.max_indexes == 0 {
            return Err(SelectionError::InvalidConfiguration(
                "Calling the drop heuristic with max_indexes < 1 does not make sense".to_string(),
            ));
        }
        if self.budget_mb.is_some_and(|budget| !budget.is_finite() || budget < 0.0) {
            return Err(SelectionError::InvalidConfiguration("budget_mb must be a non-negative number".to_string()));
        }
        Ok(())
    }

    fn budget_bytes(&self) -> Option<u64> {
        self.budget_mb.map(|budget| mb_to_b(budget) as u64)
    }
}

pub struct DropHeuristicAlgorithm<'a, C: DatabaseConnector + ?Sized> {
    base: AlgorithmBase<'a, C>,
    config: DropHeuristicConfig,
}

impl<'a, C: DatabaseConnector + ?Sized> DropHeuristicAlgorithm<'a, C> {
    pub fn new(connector: &'a mut C, config: DropHeuristicConfig) -> SelectionResult<Self> {
        config.validate()?;
        Ok(Self {
            base: AlgorithmBase::new("drop_heuristic", connector)?,
            config,
        })
    }
}

impl<C: DatabaseConnector + ?Sized> SelectionAlgorithm for DropHeuristicAlgorithm<'_, C> {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn calculate_best_indexes(&mut self, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
        info!("Parameters: {:?}", self.config);
        let config = &self.config;
        self.base.run(workload, |evaluation| drop_indexes(config, evaluation, workload))
    }

    fn cost_statistics(&self) -> CostStatistics {
        self.base.statistics()
    }
}

fn drop_indexes<C: DatabaseConnector + ?Sized>(config: &DropHeuristicConfig, evaluation: &mut CostEvaluation<'_, C>, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
    let mut remaining: BTreeSet<Index> = workload.potential_indexes().into_iter().collect();

    while !remaining.is_empty() && !is_satisfied(config, evaluation, &remaining)? {
        // Ties keep the first index in sorted order
        let mut lowest: Option<(f64, &Index)> = None;
        for index in &remaining {
            let cost = evaluation.calculate_cost(workload, remaining.iter().filter(|other| *other != index), false)?;
            debug!("Cost without {}: {}", index, cost);
            if lowest.is_none_or(|(lowest_cost, _)| cost < lowest_cost) {
                lowest = Some((cost, index));
            }
        }

        let Some((_, index)) = lowest else {
            break;
        };
        let index = index.clone();
        remaining.remove(&index);
        info!("Dropping index: {}. {} indexes remaining.", index, remaining.len());
    }

    Ok(remaining)
}

fn is_satisfied<C: DatabaseConnector + ?Sized>(config: &DropHeuristicConfig, evaluation: &mut CostEvaluation<'_, C>, remaining: &BTreeSet<Index>) -> SelectionResult<bool> {
    match config.budget_bytes() {
        None => Ok(remaining.len() <= config.max_indexes),
        Some(budget) => {
            let mut total_size = 0;
            for index in remaining {
                total_size += evaluation.estimate_size(index)?;
            }
            Ok(total_size <= budget)
        }
    }
}
