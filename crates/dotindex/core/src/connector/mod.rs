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

//! Database Connector Seam
//!
//! Index selection never creates indexes for real. It asks a database session to
//! simulate hypothetical indexes and to estimate query costs under whatever is
//! simulated at that moment. This module defines that contract and its plan format.
//!
//! Exactly one owner may drive a connector at a time: hypothetical indexes are
//! session state, so interleaving simulate/drop calls from two owners is unsafe.

pub mod model;
pub mod plan;
pub mod session;

use dotindex_common::{Index, Query};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use model::{ColumnStatistics, ModelConnector, TableStatistics};
pub use plan::{PlanNode, PlanOperation, QueryPlan};
pub use session::Session;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectorError {
    #[error("Session is closed")]
    SessionClosed,
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error("Unknown hypothetical index: {0}")]
    UnknownHypotheticalIndex(u32),
    #[error("Cost unavailable for query {query}: {reason}")]
    CostUnavailable { query: u32, reason: String },
    #[error("Unsupported statement: {0}")]
    Unsupported(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// A single result row of `exec_fetch`.
pub type Row = Vec<serde_json::Value>;

/// Handle of a hypothetical index living in a database session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HypotheticalIndex {
    pub oid: u32,
    pub name: String,
}

/// The what-if oracle: a database session that can simulate indexes and estimate costs.
#[cfg_attr(test, mockall::automock)]
pub trait DatabaseConnector {
    /// Creates a hypothetical index. No physical write happens.
    fn simulate_index(&mut self, index: &Index) -> ConnectorResult<HypotheticalIndex>;

    /// Removes a previously simulated hypothetical index.
    fn drop_simulated_index(&mut self, oid: u32) -> ConnectorResult<()>;

    /// Estimated on-disk size of a hypothetical index in bytes.
    fn estimated_index_size(&mut self, oid: u32) -> ConnectorResult<u64>;

    /// Total estimated cost of the query's plan under the indexes that currently exist in-session.
    fn get_cost(&mut self, query: &Query) -> ConnectorResult<f64>;

    /// The plan the optimizer would choose right now.
    fn get_plan(&mut self, query: &Query) -> ConnectorResult<QueryPlan>;

    /// Drops all real secondary indexes so estimates start from a clean baseline.
    fn drop_indexes(&mut self) -> ConnectorResult<()>;

    fn exec_only(&mut self, statement: &str) -> ConnectorResult<()>;

    fn exec_fetch(&mut self, statement: &str) -> ConnectorResult<Vec<Row>>;

    fn commit(&mut self) -> ConnectorResult<()>;

    fn rollback(&mut self) -> ConnectorResult<()>;

    fn close(&mut self) -> ConnectorResult<()>;
}
