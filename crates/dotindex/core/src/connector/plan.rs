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

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub total_cost: f64,
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub operation: PlanOperation,
    pub estimated_rows: f64,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOperation {
    SeqScan { table: String },
    IndexScan { table: String, index: String },
}

impl QueryPlan {
    pub fn new(nodes: Vec<PlanNode>) -> Self {
        let total_cost = nodes.iter().map(|node| node.estimated_cost).sum();
        Self { total_cost, nodes }
    }

    /// Names of the indexes the plan scans, in plan order.
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match &node.operation {
            PlanOperation::IndexScan { index, .. } => Some(index.as_str()),
            PlanOperation::SeqScan { .. } => None,
        })
    }

    pub fn uses_index(&self, name: &str) -> bool {
        self.index_names().any(|index| index == name)
    }
}
