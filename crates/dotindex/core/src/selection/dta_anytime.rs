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

//! Greedy search over optimizer recommendations under a storage budget
//!
//! The candidates are the indexes the optimizer picks per query when every possible index
//! exists. Starting from no indexes, the candidate that lowers the workload cost most is
//! added as long as the configuration fits into the budget and the cost strictly drops.

use dotindex_common::units::mb_to_b;
use dotindex_common::{Index, Workload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::microsoft::{enumerate_greedy, simulate_and_evaluate_cost};
use super::virtual_indexes::exploit_virtual_indexes;
use super::{AlgorithmBase, SelectionAlgorithm};
use crate::connector::DatabaseConnector;
use crate::cost_evaluation::CostStatistics;
use crate::error::{SelectionError, SelectionResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DtaAnytimeConfig {
    #[serde(alias = "max_index_width")]
    pub max_index_columns: usize,
    #[serde(alias = "budget", alias = "budget_MB")]
    pub budget_mb: f64,
}

impl Default for DtaAnytimeConfig {
    fn default() -> Self {
        Self {
            max_index_columns: 3,
            budget_mb: 500.0,
        }
    }
}

impl DtaAnytimeConfig {
    pub fn validate(&self) -> SelectionResult<()> {
        if self.max_index_columns == 0 {
            return Err(SelectionError::InvalidConfiguration("max_index_columns must be at least 1".to_string()));
        }
        if !self.budget_mb.is_finite() || self.budget_mb < 0.0 {
            return Err(SelectionError::InvalidConfiguration("budget_mb must be a non-negative number".to_string()));
        }
        Ok(())
    }
}

pub struct DtaAnytimeAlgorithm<'a, C: DatabaseConnector + ?Sized> {
    base: AlgorithmBase<'a, C>,
    config: DtaAnytimeConfig,
}

impl<'a, C: DatabaseConnector + ?Sized> DtaAnytimeAlgorithm<'a, C> {
    pub fn new(connector: &'a mut C, config: DtaAnytimeConfig) -> SelectionResult<Self> {
        config.validate()?;
        Ok(Self {
            base: AlgorithmBase::new("dta_anytime", connector)?,
            config,
        })
    }
}

impl<C: DatabaseConnector + ?Sized> SelectionAlgorithm for DtaAnytimeAlgorithm<'_, C> {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn calculate_best_indexes(&mut self, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
        info!("Parameters: {:?}", self.config);
        let config = &self.config;
        self.base.run(workload, |evaluation| {
            let (_, candidates) = exploit_virtual_indexes(evaluation, workload, config.max_index_columns)?;
            let candidates: Vec<Index> = candidates.into_iter().collect();
            debug!("Searching in {} candidates", candidates.len());

            let current_cost = simulate_and_evaluate_cost(evaluation, workload, &[])?;
            let budget = mb_to_b(config.budget_mb) as u64;
            let (indexes, cost) = enumerate_greedy(evaluation, workload, &candidates, BTreeSet::new(), current_cost, usize::MAX, Some(budget))?;
            info!("Lowest cost: {} with {} indexes", cost, indexes.len());
            Ok(indexes)
        })
    }

    fn cost_statistics(&self) -> CostStatistics {
        self.base.statistics()
    }
}
