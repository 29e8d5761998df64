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

//! Per-query index recommendations from the optimizer.
//!
//! For one query at a time, every syntactically possible index ("BFI": each permutation
//! of the query's columns per table, up to a width limit) is simulated, the plan is
//! requested once, and the indexes that the plan actually scans are the recommendation.

use dotindex_common::{Column, Index, Query, Workload};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::combinatorics::permutations;
use crate::connector::{DatabaseConnector, QueryPlan};
use crate::cost_evaluation::CostEvaluation;
use crate::error::{SelectionError, SelectionResult};
use crate::what_if::WhatIfIndexCreation;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecommendation {
    pub query: Query,
    pub cost_without_indexes: f64,
    pub cost_with_recommended_indexes: f64,
    pub recommended_indexes: BTreeSet<Index>,
}

impl QueryRecommendation {
    /// Cost saved by the recommendation. Can be negative.
    pub fn benefit(&self) -> f64 {
        self.cost_without_indexes - self.cost_with_recommended_indexes
    }
}

pub fn possible_indexes(query: &Query, max_index_columns: usize) -> SelectionResult<BTreeSet<Index>> {
    let mut columns_per_table: BTreeMap<Option<&str>, BTreeSet<&Column>> = BTreeMap::new();
    for column in &query.columns {
        columns_per_table.entry(column.table()).or_default().insert(column);
    }

    let mut indexes = BTreeSet::new();
    for columns in columns_per_table.values() {
        let columns: Vec<Column> = columns.iter().map(|column| (*column).clone()).collect();
        for width in 1..=max_index_columns.min(columns.len()) {
            for permutation in permutations(&columns, width) {
                indexes.insert(Index::new(permutation)?);
            }
        }
    }

    debug!("{}: {} possible indexes", query, indexes.len());
    Ok(indexes)
}

/// Indexes the optimizer uses for `query` when all possible indexes exist, stamped with
/// their estimated sizes, plus the plan cost in that state. The session is left without
/// the simulated indexes, also when planning fails.
pub fn recommended_indexes<C: DatabaseConnector + ?Sized>(connector: &mut C, query: &Query, max_index_columns: usize) -> SelectionResult<(BTreeSet<Index>, f64)> {
    let possible = possible_indexes(query, max_index_columns)?;
    let mut what_if = WhatIfIndexCreation::new();

    let recommendation = plan_with_indexes(connector, &mut what_if, &possible, query).map(|plan| {
        let recommended: BTreeSet<Index> = possible
            .iter()
            .filter(|index| what_if.hypothetical_name(index).is_some_and(|name| plan.uses_index(name)))
            .map(|index| match what_if.estimated_size(index) {
                Some(size) => index.clone().with_estimated_size(size),
                None => index.clone(),
            })
            .collect();
        (recommended, plan.total_cost)
    });
    let cleanup = what_if.drop_all_simulated_indexes(connector);

    let recommendation = recommendation?;
    cleanup?;
    debug!("Recommended indexes found for {}: {}", query, recommendation.0.len());
    Ok(recommendation)
}

fn plan_with_indexes<C: DatabaseConnector + ?Sized>(connector: &mut C, what_if: &mut WhatIfIndexCreation, indexes: &BTreeSet<Index>, query: &Query) -> SelectionResult<QueryPlan> {
    for index in indexes {
        what_if.simulate_index(connector, index, true)?;
    }
    Ok(connector.get_plan(query)?)
}

/// Recommendation per query and the union of all recommended indexes.
///
/// Must run before the evaluation simulates any configuration, as those indexes would
/// be visible to the planner.
pub fn exploit_virtual_indexes<C: DatabaseConnector + ?Sized>(
    evaluation: &mut CostEvaluation<'_, C>,
    workload: &Workload,
    max_index_columns: usize,
) -> SelectionResult<(Vec<QueryRecommendation>, BTreeSet<Index>)> {
    if !evaluation.current_indexes().is_empty() {
        return Err(SelectionError::InvalidState("Virtual indexes must be exploited on a clean session".to_string()));
    }

    let connector = evaluation.connector_mut();
    let mut recommendations = Vec::with_capacity(workload.len());
    let mut candidates = BTreeSet::new();

    for query in &workload.queries {
        let cost_without_indexes = connector.get_plan(query)?.total_cost;
        let (recommended_indexes, cost_with_recommended_indexes) = recommended_indexes(connector, query, max_index_columns)?;
        candidates.extend(recommended_indexes.iter().cloned());
        recommendations.push(QueryRecommendation {
            query: query.clone(),
            cost_without_indexes,
            cost_with_recommended_indexes,
            recommended_indexes,
        });
    }

    Ok((recommendations, candidates))
}
