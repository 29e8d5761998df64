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

//! Greedy enumeration with candidate selection
//!
//! Each round first selects candidates per query (the best configuration for that query
//! alone), then enumerates the union of all candidates against the whole workload. An
//! enumeration seeds with the cheapest combination of at most `max_indexes_naive`
//! candidates and then greedily adds the candidate that lowers the cost most, until
//! nothing improves or `max_indexes` is reached. Between rounds the winners are widened
//! by one column of the same table, up to `max_index_columns` columns.

use dotindex_common::{Index, Workload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::iter;
use tracing::{debug, info};

use super::combinatorics::combinations;
use super::{AlgorithmBase, SelectionAlgorithm};
use crate::connector::DatabaseConnector;
use crate::cost_evaluation::{CostEvaluation, CostStatistics};
use crate::error::{SelectionError, SelectionResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MicrosoftConfig {
    pub max_indexes: usize,
    pub max_indexes_naive: usize,
    #[serde(alias = "max_index_width")]
    pub max_index_columns: usize,
}

impl Default for MicrosoftConfig {
    fn default() -> Self {
        Self {
            max_indexes: 15,
            max_indexes_naive: 3,
            max_index_columns: 2,
        }
    }
}

impl MicrosoftConfig {
    pub fn validate(&self) -> SelectionResult<()> {
        if self.max_index_columns == 0 {
            return Err(SelectionError::InvalidConfiguration("max_index_columns must be at least 1".to_string()));
        }
        Ok(())
    }

    fn naive_limit(&self) -> usize {
        self.max_indexes_naive.min(self.max_indexes)
    }
}

pub struct MicrosoftAlgorithm<'a, C: DatabaseConnector + ?Sized> {
    base: AlgorithmBase<'a, C>,
    config: MicrosoftConfig,
}

impl<'a, C: DatabaseConnector + ?Sized> MicrosoftAlgorithm<'a, C> {
    pub fn new(connector: &'a mut C, config: MicrosoftConfig) -> SelectionResult<Self> {
        config.validate()?;
        Ok(Self {
            base: AlgorithmBase::new("microsoft", connector)?,
            config,
        })
    }
}

impl<C: DatabaseConnector + ?Sized> SelectionAlgorithm for MicrosoftAlgorithm<'_, C> {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn calculate_best_indexes(&mut self, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
        info!("Parameters: {:?}", self.config);
        let config = &self.config;
        self.base.run(workload, |evaluation| {
            if config.max_indexes == 0 {
                return Ok(BTreeSet::new());
            }

            let mut potential_indexes: BTreeSet<Index> = workload.potential_indexes().into_iter().collect();
            let mut indexes = BTreeSet::new();
            for max_columns in 1..=config.max_index_columns {
                let candidates = select_index_candidates(config, evaluation, workload, &potential_indexes)?;
                indexes = enumerate_combinations(config, evaluation, workload, &candidates)?;

                if max_columns < config.max_index_columns {
                    potential_indexes = create_multicolumn_indexes(workload, &indexes)?;
                    potential_indexes.extend(indexes.iter().cloned());
                }
            }
            Ok(indexes)
        })
    }

    fn cost_statistics(&self) -> CostStatistics {
        self.base.statistics()
    }
}

/// Union of the best configuration of every query on its own. An index is a candidate
/// for a query only if the query references its leading column.
fn select_index_candidates<C: DatabaseConnector + ?Sized>(
    config: &MicrosoftConfig,
    evaluation: &mut CostEvaluation<'_, C>,
    workload: &Workload,
    potential_indexes: &BTreeSet<Index>,
) -> SelectionResult<BTreeSet<Index>> {
    let mut candidates = BTreeSet::new();
    for query in &workload.queries {
        debug!("Find candidates for query\t{}...", query);
        let query_workload = workload.for_query(query);
        let query_indexes: BTreeSet<Index> = potential_indexes.iter().filter(|index| query.references(index.leading_column())).cloned().collect();
        candidates.extend(enumerate_combinations(config, evaluation, &query_workload, &query_indexes)?);
    }

    info!("Number of candidates: {}", candidates.len());
    Ok(candidates)
}

fn enumerate_combinations<C: DatabaseConnector + ?Sized>(
    config: &MicrosoftConfig,
    evaluation: &mut CostEvaluation<'_, C>,
    workload: &Workload,
    candidates: &BTreeSet<Index>,
) -> SelectionResult<BTreeSet<Index>> {
    let candidates: Vec<Index> = candidates.iter().cloned().collect();
    debug!("Start enumeration: {} candidates, {} indexes to be selected", candidates.len(), config.max_indexes);

    let number_indexes_naive = config.naive_limit().min(candidates.len());
    let (indexes, cost) = enumerate_naive(evaluation, workload, &candidates, number_indexes_naive)?;
    debug!("Lowest cost (naive): {} with {} indexes", cost, indexes.len());

    let number_indexes = config.max_indexes.min(candidates.len());
    let (indexes, cost) = enumerate_greedy(evaluation, workload, &candidates, indexes, cost, number_indexes, None)?;
    debug!("Lowest cost (greedy): {} with {} indexes", cost, indexes.len());

    Ok(indexes)
}

/// Cheapest combination of 1 to `number_indexes_naive` candidates. The first combination
/// wins ties. Without any combination to try the seed is the empty configuration.
fn enumerate_naive<C: DatabaseConnector + ?Sized>(
    evaluation: &mut CostEvaluation<'_, C>,
    workload: &Workload,
    candidates: &[Index],
    number_indexes_naive: usize,
) -> SelectionResult<(BTreeSet<Index>, f64)> {
    let mut lowest: Option<(Vec<Index>, f64)> = None;

    for number_of_indexes in 1..=number_indexes_naive {
        for combination in combinations(candidates, number_of_indexes) {
            let cost = simulate_and_evaluate_cost(evaluation, workload, &combination)?;
            if lowest.as_ref().is_none_or(|(_, lowest_cost)| cost < *lowest_cost) {
                lowest = Some((combination, cost));
            }
        }
    }

    match lowest {
        Some((combination, cost)) => Ok((combination.into_iter().collect(), cost)),
        None => Ok((BTreeSet::new(), simulate_and_evaluate_cost(evaluation, workload, &[])?)),
    }
}

/// Adds the best remaining candidate while that strictly lowers the cost. With a `budget`
/// (bytes) a candidate is only considered if the grown configuration still fits.
pub(super) fn enumerate_greedy<C: DatabaseConnector + ?Sized>(
    evaluation: &mut CostEvaluation<'_, C>,
    workload: &Workload,
    candidates: &[Index],
    mut current_indexes: BTreeSet<Index>,
    mut current_cost: f64,
    number_indexes: usize,
    budget: Option<u64>,
) -> SelectionResult<(BTreeSet<Index>, f64)> {
    while current_indexes.len() < number_indexes {
        let mut best: Option<(&Index, f64)> = None;
        for index in candidates.iter().filter(|index| !current_indexes.contains(*index)) {
            let cost = simulate_and_evaluate_cost(evaluation, workload, current_indexes.iter().chain(iter::once(index)))?;
            if let Some(budget) = budget
                && evaluation.total_size(current_indexes.iter().chain(iter::once(index)))? > budget
            {
                continue;
            }
            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((index, cost));
            }
        }

        match best {
            Some((index, cost)) if cost < current_cost => {
                debug!("Additional best index found: {} ({})", index, cost);
                current_indexes.insert(index.clone());
                current_cost = cost;
            }
            _ => break,
        }
    }

    Ok((current_indexes, current_cost))
}

pub(super) fn simulate_and_evaluate_cost<'i, C: DatabaseConnector + ?Sized>(
    evaluation: &mut CostEvaluation<'_, C>,
    workload: &Workload,
    indexes: impl IntoIterator<Item = &'i Index>,
) -> SelectionResult<f64> {
    let cost = evaluation.calculate_cost(workload, indexes, true)?;
    Ok((cost * 100.0).round() / 100.0)
}

/// Every index extended by each indexable column of its table that it does not contain yet.
fn create_multicolumn_indexes(workload: &Workload, indexes: &BTreeSet<Index>) -> SelectionResult<BTreeSet<Index>> {
    let indexable_columns = workload.indexable_columns();
    let mut multicolumn_candidates = BTreeSet::new();

    for index in indexes {
        for column in indexable_columns.iter().filter(|column| column.table() == index.table() && !index.contains(column)) {
            multicolumn_candidates.insert(index.appended(column.clone())?);
        }
    }
    Ok(multicolumn_candidates)
}
