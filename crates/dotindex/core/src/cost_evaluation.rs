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

//! Cost Evaluation
//!
//! Answers "what would the workload cost under this index configuration?" on top of a
//! what-if session. Two devices keep the number of oracle round trips low:
//!
//! - **Reconciliation**: the session keeps the previously requested configuration
//!   simulated, and a new request only simulates the added and drops the removed indexes.
//! - **Cost cache**: per query, costs are keyed by the *relevant* indexes, i.e. those that
//!   share at least one column with the query. The key is a sorted set, so any two
//!   configurations that agree on the relevant subset share the entry.
//!
//! An evaluation is used by exactly one algorithm run and must be completed afterwards,
//! which drops every simulated index. Requests after completion are rejected.

use dotindex_common::{Index, Query, Workload};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::connector::{ConnectorError, DatabaseConnector};
use crate::error::{SelectionError, SelectionResult};
use crate::what_if::WhatIfIndexCreation;

/// Cache statistics of one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostStatistics {
    pub cost_requests: u64,
    pub cache_hits: u64,
}

impl CostStatistics {
    /// Hit ratio in percent rounded to two decimals, `None` without requests.
    pub fn hit_ratio(&self) -> Option<f64> {
        if self.cost_requests == 0 {
            return None;
        }
        let ratio = self.cache_hits as f64 / self.cost_requests as f64 * 100.0;
        Some((ratio * 100.0).round() / 100.0)
    }
}

type RelevantIndexes = BTreeSet<Index>;

pub struct CostEvaluation<'a, C: DatabaseConnector + ?Sized> {
    connector: &'a mut C,
    what_if: WhatIfIndexCreation,
    current_indexes: BTreeSet<Index>,
    cache: HashMap<Query, HashMap<RelevantIndexes, f64>>,
    cost_requests: u64,
    cache_hits: u64,
    completed: bool,
}

impl<'a, C: DatabaseConnector + ?Sized> CostEvaluation<'a, C> {
    pub fn new(connector: &'a mut C) -> Self {
        debug!("Init cost evaluation");
        Self {
            connector,
            what_if: WhatIfIndexCreation::new(),
            current_indexes: BTreeSet::new(),
            cache: HashMap::new(),
            cost_requests: 0,
            cache_hits: 0,
            completed: false,
        }
    }

    /// Total estimated cost of `workload` if exactly `indexes` existed.
    pub fn calculate_cost<'i>(&mut self, workload: &Workload, indexes: impl IntoIterator<Item = &'i Index>, store_size: bool) -> SelectionResult<f64> {
        if self.completed {
            return Err(SelectionError::InvalidState("Cost estimation was already completed".to_string()));
        }

        let indexes: BTreeSet<Index> = indexes.into_iter().cloned().collect();
        self.prepare_cost_calculation(&indexes, store_size)?;

        let mut total_cost = 0.0;
        for query in &workload.queries {
            total_cost += self.request_cost(query, &indexes)?;
        }
        Ok(total_cost)
    }

    /// Drops every simulated index and refuses further requests. Must be called exactly once.
    pub fn complete_cost_estimation(&mut self) -> SelectionResult<()> {
        if self.completed {
            return Err(SelectionError::InvalidState("Cost estimation was already completed".to_string()));
        }

        self.completed = true;
        self.current_indexes.clear();
        self.what_if.drop_all_simulated_indexes(&mut *self.connector)
    }

    /// Size of `index` in bytes, simulating it transiently if no size is known yet.
    pub fn estimate_size(&mut self, index: &Index) -> SelectionResult<u64> {
        if let Some(size) = self.what_if.estimated_size(index) {
            return Ok(size);
        }
        if self.completed {
            return Err(SelectionError::InvalidState(format!("Cannot estimate the size of {index} after completion")));
        }
        if self.what_if.is_simulated(index) {
            return self.what_if.request_estimated_size(&mut *self.connector, index);
        }

        self.what_if.simulate_index(&mut *self.connector, index, true)?;
        let size = self.what_if.request_estimated_size(&mut *self.connector, index);
        self.what_if.drop_simulated_index(&mut *self.connector, index)?;
        size
    }

    /// Size known for `index`, from the value itself or from an earlier simulation.
    pub fn estimated_size(&self, index: &Index) -> Option<u64> {
        self.what_if.estimated_size(index)
    }

    /// Combined size of `indexes`. Every size must be known.
    pub fn total_size<'i>(&self, indexes: impl IntoIterator<Item = &'i Index>) -> SelectionResult<u64> {
        indexes.into_iter().try_fold(0, |total, index| {
            self.estimated_size(index)
                .map(|size| total + size)
                .ok_or_else(|| SelectionError::InvalidState(format!("Size of {index} is unknown")))
        })
    }

    /// Copy of `index` carrying its known size, if any.
    pub fn with_known_size(&self, index: &Index) -> Index {
        match self.estimated_size(index) {
            Some(size) => index.clone().with_estimated_size(size),
            None => index.clone(),
        }
    }

    /// Name of the hypothetical index backing `index` in the current configuration.
    pub fn hypothetical_name(&self, index: &Index) -> Option<&str> {
        self.what_if.hypothetical_name(index)
    }

    pub fn connector_mut(&mut self) -> &mut C {
        &mut *self.connector
    }

    pub fn current_indexes(&self) -> &BTreeSet<Index> {
        &self.current_indexes
    }

    pub fn cost_requests(&self) -> u64 {
        self.cost_requests
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub fn statistics(&self) -> CostStatistics {
        CostStatistics {
            cost_requests: self.cost_requests,
            cache_hits: self.cache_hits,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn prepare_cost_calculation(&mut self, indexes: &BTreeSet<Index>, store_size: bool) -> SelectionResult<()> {
        let to_remove: Vec<Index> = self.current_indexes.difference(indexes).cloned().collect();
        let to_add: Vec<Index> = indexes.difference(&self.current_indexes).cloned().collect();

        for index in &to_remove {
            self.what_if.drop_simulated_index(&mut *self.connector, index)?;
            self.current_indexes.remove(index);
        }
        for index in &to_add {
            self.what_if.simulate_index(&mut *self.connector, index, store_size)?;
            self.current_indexes.insert(index.clone());
        }

        if store_size {
            for index in indexes {
                self.what_if.request_estimated_size(&mut *self.connector, index)?;
            }
        }
        Ok(())
    }

    fn request_cost(&mut self, query: &Query, indexes: &BTreeSet<Index>) -> SelectionResult<f64> {
        self.cost_requests += 1;

        let relevant_indexes: RelevantIndexes = indexes
            .iter()
            .filter(|index| index.columns().iter().any(|column| query.references(column)))
            .cloned()
            .collect();

        if let Some(cost) = self.cache.get(query).and_then(|costs| costs.get(&relevant_indexes)) {
            self.cache_hits += 1;
            return Ok(*cost);
        }

        let cost = self.connector.get_cost(query)?;
        if !cost.is_finite() {
            return Err(ConnectorError::CostUnavailable {
                query: query.nr,
                reason: format!("oracle returned {cost}"),
            }
            .into());
        }

        self.cache.entry(query.clone()).or_default().insert(relevant_indexes, cost);
        Ok(cost)
    }
}

impl<C: DatabaseConnector + ?Sized> Drop for CostEvaluation<'_, C> {
    fn drop(&mut self) {
        if !self.completed && self.what_if.simulated_count() > 0 {
            warn!("Cost evaluation dropped with {} simulated indexes left", self.what_if.simulated_count());
        }
    }
}
