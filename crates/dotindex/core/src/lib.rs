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

//! # DotIndex Core
//!
//! What-if driven index selection. Selection algorithms explore which indexes should
//! exist for a workload under a storage budget and use a database's cost estimator as
//! an oracle instead of materializing indexes.
//!
//! ## Modules
//!
//! - `connector`: the oracle seam (`DatabaseConnector`), plan structures, the scoped
//!   session guard and the statistics-driven `ModelConnector`
//! - `what_if`: bookkeeping of hypothetical indexes simulated in a session
//! - `cost_evaluation`: cached workload cost under a candidate index configuration
//! - `selection`: the selection algorithms and their registry
//!
//! ## Flow
//!
//! 1. A runner builds a `Workload` and picks an `AlgorithmKind`
//! 2. The algorithm asks `CostEvaluation` for the cost of candidate configurations
//! 3. `CostEvaluation` reconciles the simulated indexes and asks the connector per query
//! 4. The algorithm converges on its final index set

pub mod connector;
pub mod cost_evaluation;
pub mod cost_model;
pub mod error;
pub mod selection;
pub mod what_if;

#[cfg(test)]
pub(crate) mod testing;

pub use connector::{ConnectorError, ConnectorResult, DatabaseConnector, HypotheticalIndex, ModelConnector, QueryPlan, Session};
pub use cost_evaluation::{CostEvaluation, CostStatistics};
pub use error::{SelectionError, SelectionResult};
pub use selection::{AlgorithmKind, Parameters, SelectionAlgorithm};
pub use what_if::WhatIfIndexCreation;
