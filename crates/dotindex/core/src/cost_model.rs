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

pub const PAGE_SIZE: u64 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub cpu_cost: f64,
    pub io_cost: f64,
    pub total_cost: f64,
}

impl CostEstimate {
    pub fn new(cpu: f64, io: f64) -> Self {
        Self {
            cpu_cost: cpu,
            io_cost: io,
            total_cost: cpu + io,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationCost {
    /// Reads every page and evaluates every row.
    TableScan { rows: f64, pages: u64 },
    /// Walks `index_pages` index pages and fetches `rows` heap tuples.
    IndexScan { rows: f64, index_pages: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModel {
    pub cpu_cost_per_row: f64,
    pub io_cost_per_page: f64,
    pub heap_fetch_cost: f64,
}

impl CostModel {
    pub fn new() -> Self {
        Self {
            cpu_cost_per_row: 0.01,
            io_cost_per_page: 1.0,
            heap_fetch_cost: 1.2, // Random I/O penalty per fetched tuple
        }
    }

    pub fn estimate_operation_cost(&self, operation: &OperationCost) -> CostEstimate {
        match operation {
            OperationCost::TableScan { rows, pages } => {
                let io_cost = *pages as f64 * self.io_cost_per_page;
                let cpu_cost = rows * self.cpu_cost_per_row;
                CostEstimate::new(cpu_cost, io_cost)
            }
            OperationCost::IndexScan { rows, index_pages } => {
                let io_cost = *index_pages as f64 * self.io_cost_per_page + rows * self.heap_fetch_cost;
                let cpu_cost = rows * self.cpu_cost_per_row * 0.5;
                CostEstimate::new(cpu_cost, io_cost)
            }
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new()
    }
}
