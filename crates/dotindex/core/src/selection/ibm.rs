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

//! Benefit/size ratio heuristic
//!
//! Candidates are the indexes the optimizer recommends per query. The benefit of a
//! candidate is the cost saved by every query that recommends it. Candidates are taken
//! by descending benefit per byte while they fit into the budget, after indexes that are
//! a prefix of a better-ratio index have been folded into it. A time-bounded random local
//! search ("try variations") then swaps selected and unused indexes and keeps a swap
//! whenever the workload gets cheaper.

use dotindex_common::units::mb_to_b;
use dotindex_common::{Index, Workload};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::virtual_indexes::{QueryRecommendation, exploit_virtual_indexes};
use super::{AlgorithmBase, SelectionAlgorithm};
use crate::connector::DatabaseConnector;
use crate::cost_evaluation::{CostEvaluation, CostStatistics};
use crate::error::{SelectionError, SelectionResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IbmConfig {
    #[serde(alias = "max_index_width")]
    pub max_index_columns: usize,
    #[serde(alias = "budget", alias = "budget_MB")]
    pub budget_mb: f64,
    /// Wall-clock time for try variations. 0 skips them.
    pub try_variation_seconds_limit: f64,
    pub try_variation_maximum_remove: usize,
    /// Stops try variations after this many iterations, even before the time limit.
    pub try_variation_maximum_iterations: Option<u64>,
    /// Seed of the variation search. Without a seed the search is not reproducible.
    pub seed: Option<u64>,
}

impl Default for IbmConfig {
    fn default() -> Self {
        Self {
            max_index_columns: 3,
            budget_mb: 500.0,
            try_variation_seconds_limit: 10.0,
            try_variation_maximum_remove: 4,
            try_variation_maximum_iterations: None,
            seed: None,
        }
    }
}

impl IbmConfig {
    pub fn validate(&self) -> SelectionResult<()> {
        if self.max_index_columns == 0 {
            return Err(SelectionError::InvalidConfiguration("max_index_columns must be at least 1".to_string()));
        }
        if !self.budget_mb.is_finite() || self.budget_mb < 0.0 {
            return Err(SelectionError::InvalidConfiguration("budget_mb must be a non-negative number".to_string()));
        }
        if Duration::try_from_secs_f64(self.try_variation_seconds_limit).is_err() {
            return Err(SelectionError::InvalidConfiguration(format!(
                "try_variation_seconds_limit must be a non-negative number of seconds, got {}",
                self.try_variation_seconds_limit
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexBenefit {
    pub index: Index,
    pub benefit: f64,
    pub size: u64,
}

impl IndexBenefit {
    pub fn benefit_size_ratio(&self) -> f64 {
        self.benefit / self.size.max(1) as f64
    }
}

pub struct IbmAlgorithm<'a, C: DatabaseConnector + ?Sized> {
    base: AlgorithmBase<'a, C>,
    config: IbmConfig,
}

impl<'a, C: DatabaseConnector + ?Sized> IbmAlgorithm<'a, C> {
    pub fn new(connector: &'a mut C, config: IbmConfig) -> SelectionResult<Self> {
        config.validate()?;
        Ok(Self {
            base: AlgorithmBase::new("ibm", connector)?,
            config,
        })
    }
}

impl<C: DatabaseConnector + ?Sized> SelectionAlgorithm for IbmAlgorithm<'_, C> {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn calculate_best_indexes(&mut self, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
        info!("Parameters: {:?}", self.config);
        let config = &self.config;
        self.base.run(workload, |evaluation| select(config, evaluation, workload))
    }

    fn cost_statistics(&self) -> CostStatistics {
        self.base.statistics()
    }
}

fn select<C: DatabaseConnector + ?Sized>(config: &IbmConfig, evaluation: &mut CostEvaluation<'_, C>, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
    let (recommendations, candidates) = exploit_virtual_indexes(evaluation, workload, config.max_index_columns)?;
    let index_benefits = combine_subsumed(calculate_index_benefits(evaluation, &candidates, &recommendations)?);
    let budget = mb_to_b(config.budget_mb) as u64;

    let mut selected = Vec::new();
    let mut disk_usage = 0;
    for index_benefit in &index_benefits {
        if disk_usage + index_benefit.size <= budget {
            disk_usage += index_benefit.size;
            selected.push(index_benefit.clone());
        }
    }
    info!("Selected {} of {} candidates using {} bytes", selected.len(), index_benefits.len(), disk_usage);

    if config.try_variation_seconds_limit > 0.0 {
        selected = try_variations(config, evaluation, workload, selected, &index_benefits, budget)?;
    }
    Ok(selected.into_iter().map(|index_benefit| index_benefit.index).collect())
}

/// Benefits sorted by descending benefit per byte. Equal ratios keep candidate order.
fn calculate_index_benefits<C: DatabaseConnector + ?Sized>(
    evaluation: &mut CostEvaluation<'_, C>,
    candidates: &BTreeSet<Index>,
    recommendations: &[QueryRecommendation],
) -> SelectionResult<Vec<IndexBenefit>> {
    let mut index_benefits = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let benefit = recommendations
            .iter()
            .filter(|recommendation| recommendation.recommended_indexes.contains(candidate))
            .map(QueryRecommendation::benefit)
            .sum();
        index_benefits.push(IndexBenefit {
            index: candidate.clone(),
            benefit,
            size: evaluation.estimate_size(candidate)?,
        });
    }

    sort_by_ratio(&mut index_benefits);
    Ok(index_benefits)
}

fn sort_by_ratio(index_benefits: &mut [IndexBenefit]) {
    index_benefits.sort_by(|a, b| b.benefit_size_ratio().total_cmp(&a.benefit_size_ratio()));
}

/// Folds every index that is a prefix of an index with a higher ratio into that index,
/// adding up the benefits. The input must be sorted by ratio.
fn combine_subsumed(mut index_benefits: Vec<IndexBenefit>) -> Vec<IndexBenefit> {
    if index_benefits.len() < 2 {
        return index_benefits;
    }

    let mut subsumed = vec![false; index_benefits.len()];
    for high in 0..index_benefits.len() {
        if subsumed[high] {
            continue;
        }
        for low in high + 1..index_benefits.len() {
            if subsumed[low] || !index_benefits[high].index.subsumes(&index_benefits[low].index) {
                continue;
            }
            let benefit = index_benefits[low].benefit;
            index_benefits[high].benefit += benefit;
            subsumed[low] = true;
        }
    }

    let mut combined: Vec<IndexBenefit> = index_benefits.into_iter().zip(subsumed).filter(|(_, subsumed)| !subsumed).map(|(index_benefit, _)| index_benefit).collect();
    sort_by_ratio(&mut combined);
    combined
}

fn try_variations<C: DatabaseConnector + ?Sized>(
    config: &IbmConfig,
    evaluation: &mut CostEvaluation<'_, C>,
    workload: &Workload,
    mut selected: Vec<IndexBenefit>,
    index_benefits: &[IndexBenefit],
    budget: u64,
) -> SelectionResult<Vec<IndexBenefit>> {
    debug!("Try variations for {} seconds", config.try_variation_seconds_limit);
    // A limit beyond what `Instant` can represent means no deadline
    let deadline = Duration::try_from_secs_f64(config.try_variation_seconds_limit)
        .ok()
        .and_then(|limit| Instant::now().checked_add(limit));

    let mut not_used = unused(index_benefits, &selected);
    let maximum_remove = config.try_variation_maximum_remove.min(selected.len()).min(not_used.len());
    if maximum_remove == 0 {
        return Ok(selected);
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut current_cost = evaluate_workload(evaluation, workload, &selected)?;
    debug!("Initial cost \t{}", current_cost);

    let mut iterations: u64 = 0;
    while deadline.is_none_or(|deadline| Instant::now() < deadline)
        && config.try_variation_maximum_iterations.is_none_or(|maximum| iterations < maximum)
    {
        iterations += 1;
        let number_of_exchanges = if maximum_remove > 1 { rng.gen_range(1..maximum_remove) } else { 1 };

        let to_remove: Vec<&Index> = selected.choose_multiple(&mut rng, number_of_exchanges).map(|index_benefit| &index_benefit.index).collect();
        let mut variation: Vec<IndexBenefit> = selected.iter().filter(|index_benefit| !to_remove.contains(&&index_benefit.index)).cloned().collect();
        let mut variation_size: u64 = variation.iter().map(|index_benefit| index_benefit.size).sum();

        for index_benefit in not_used.choose_multiple(&mut rng, number_of_exchanges) {
            if variation_size + index_benefit.size > budget {
                continue;
            }
            variation_size += index_benefit.size;
            variation.push(index_benefit.clone());
        }

        let cost_of_variation = evaluate_workload(evaluation, workload, &variation)?;
        if cost_of_variation < current_cost {
            debug!("Lower cost found \t{}", cost_of_variation);
            current_cost = cost_of_variation;
            selected = variation;
            not_used = unused(index_benefits, &selected);
        }
    }

    debug!("Try variations finished after {} iterations", iterations);
    Ok(selected)
}

fn unused(index_benefits: &[IndexBenefit], selected: &[IndexBenefit]) -> Vec<IndexBenefit> {
    index_benefits
        .iter()
        .filter(|candidate| !selected.iter().any(|index_benefit| index_benefit.index == candidate.index))
        .cloned()
        .collect()
}

fn evaluate_workload<C: DatabaseConnector + ?Sized>(evaluation: &mut CostEvaluation<'_, C>, workload: &Workload, index_benefits: &[IndexBenefit]) -> SelectionResult<f64> {
    evaluation.calculate_cost(workload, index_benefits.iter().map(|index_benefit| &index_benefit.index), false)
}
