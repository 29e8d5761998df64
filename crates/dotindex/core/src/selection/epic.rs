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

//! Benefit/size ratio search that grows indexes one column at a time
//!
//! Every step tries each single-column candidate twice: as an additional index, and
//! appended to every selected index of the same table. The variant with the best cost
//! saving per byte replaces the configuration, as long as it fits into the budget. The
//! search stops after a step without a positive ratio. Once the configuration is sized,
//! candidates whose own size would overflow the budget are not tried anymore.

use dotindex_common::units::mb_to_b;
use dotindex_common::{Index, Workload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::iter;
use tracing::{debug, info};

use super::{AlgorithmBase, SelectionAlgorithm};
use crate::connector::DatabaseConnector;
use crate::cost_evaluation::{CostEvaluation, CostStatistics};
use crate::error::{SelectionError, SelectionResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EpicConfig {
    #[serde(alias = "budget", alias = "budget_MB")]
    pub budget_mb: f64,
}

impl Default for EpicConfig {
    fn default() -> Self {
        Self { budget_mb: 10.0 }
    }
}

impl EpicConfig {
    pub fn validate(&self) -> SelectionResult<()> {
        if !self.budget_mb.is_finite() || self.budget_mb < 0.0 {
            return Err(SelectionError::InvalidConfiguration("budget_mb must be a non-negative number".to_string()));
        }
        Ok(())
    }
}

pub struct EpicAlgorithm<'a, C: DatabaseConnector + ?Sized> {
    base: AlgorithmBase<'a, C>,
    config: EpicConfig,
}

impl<'a, C: DatabaseConnector + ?Sized> EpicAlgorithm<'a, C> {
    pub fn new(connector: &'a mut C, config: EpicConfig) -> SelectionResult<Self> {
        config.validate()?;
        Ok(Self {
            base: AlgorithmBase::new("epic", connector)?,
            config,
        })
    }
}

impl<C: DatabaseConnector + ?Sized> SelectionAlgorithm for EpicAlgorithm<'_, C> {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn calculate_best_indexes(&mut self, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
        info!("Parameters: {:?}", self.config);
        let budget = mb_to_b(self.config.budget_mb) as u64;
        self.base.run(workload, |evaluation| grow(evaluation, workload, budget))
    }

    fn cost_statistics(&self) -> CostStatistics {
        self.base.statistics()
    }
}

/// Best variant of the current step. `cost` starts out as the cost of the configuration
/// the step began with, so `ratio` is the saving per byte relative to the best so far.
struct Best {
    combination: Vec<Index>,
    ratio: f64,
    cost: f64,
}

fn grow<C: DatabaseConnector + ?Sized>(evaluation: &mut CostEvaluation<'_, C>, workload: &Workload, budget: u64) -> SelectionResult<BTreeSet<Index>> {
    let candidates = workload.potential_indexes();
    let mut combination: Vec<Index> = Vec::new();
    let mut best = Best {
        combination: Vec::new(),
        ratio: 0.0,
        cost: evaluation.calculate_cost(workload, &combination, true)?,
    };
    let mut combination_size: Option<u64> = None;
    let mut step = 0;

    loop {
        debug!("Step {}: {} indexes", step, combination.len());
        for candidate in &candidates {
            if let Some(size) = combination_size
                && size + evaluation.estimate_size(candidate)? > budget
            {
                continue;
            }

            if !combination.contains(candidate) {
                let added: Vec<Index> = combination.iter().cloned().chain(iter::once(candidate.clone())).collect();
                evaluate_combination(evaluation, workload, added, &mut best, budget)?;
            }

            for (position, index) in combination.iter().enumerate() {
                if !index.appendable_by(candidate) {
                    continue;
                }
                let widened = index.appended(candidate.leading_column().clone())?;
                if combination.contains(&widened) {
                    continue;
                }
                let mut replaced = combination.clone();
                replaced[position] = widened;
                evaluate_combination(evaluation, workload, replaced, &mut best, budget)?;
            }
        }

        if best.ratio <= 0.0 {
            break;
        }
        combination = std::mem::take(&mut best.combination);
        best.ratio = 0.0;
        step += 1;
        let size = evaluation.total_size(&combination)?;
        combination_size = Some(size);
        info!("Step {}: cost {} with {} indexes of {} bytes", step, best.cost, combination.len(), size);
    }

    Ok(combination.into_iter().collect())
}

fn evaluate_combination<C: DatabaseConnector + ?Sized>(
    evaluation: &mut CostEvaluation<'_, C>,
    workload: &Workload,
    combination: Vec<Index>,
    best: &mut Best,
    budget: u64,
) -> SelectionResult<()> {
    let cost = evaluation.calculate_cost(workload, &combination, true)?;
    let size = evaluation.total_size(&combination)?;
    let ratio = (best.cost - cost) / size.max(1) as f64;

    if ratio > best.ratio && size <= budget {
        debug!("New best cost: {}\t{}", cost, size);
        *best = Best { combination, ratio, cost };
    }
    Ok(())
}
