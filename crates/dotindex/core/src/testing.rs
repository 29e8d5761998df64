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

//! Deterministic connector for algorithm tests.
//!
//! A query's cost is looked up by the longest prefix of a simulated index that the query
//! references: `prefix_costs[nr][k]` is the cost with a usable prefix of length `k`
//! (index 0 is the cost without a usable index, longer prefixes clamp to the last entry).
//! An index is reported in the plan when its leading column is referenced.

use dotindex_common::{Column, Index, Query, Table};
use std::collections::{BTreeMap, HashMap};

use crate::connector::{ConnectorError, ConnectorResult, DatabaseConnector, HypotheticalIndex, PlanNode, PlanOperation, QueryPlan, Row};

pub(crate) const BYTES_PER_COLUMN: u64 = 1_000_000;

pub(crate) struct ScriptedConnector {
    prefix_costs: HashMap<u32, Vec<f64>>,
    simulated: BTreeMap<u32, Index>,
    next_oid: u32,
    pub(crate) simulate_calls: usize,
    pub(crate) drop_calls: usize,
    pub(crate) cost_calls: usize,
    pub(crate) drop_indexes_calls: usize,
}

impl ScriptedConnector {
    pub(crate) fn new(prefix_costs: &[(u32, Vec<f64>)]) -> Self {
        Self {
            prefix_costs: prefix_costs.iter().cloned().collect(),
            simulated: BTreeMap::new(),
            next_oid: 1,
            simulate_calls: 0,
            drop_calls: 0,
            cost_calls: 0,
            drop_indexes_calls: 0,
        }
    }

    pub(crate) fn simulated_count(&self) -> usize {
        self.simulated.len()
    }

    fn name(oid: u32, index: &Index) -> String {
        format!("<{oid}>btree_{}", index.idx_name())
    }

    fn usable_prefix(query: &Query, index: &Index) -> usize {
        index.columns().iter().take_while(|column| query.references(column)).count()
    }

    fn cost_with_prefix(&self, query: &Query, prefix: usize) -> f64 {
        match self.prefix_costs.get(&query.nr) {
            Some(costs) if !costs.is_empty() => costs[prefix.min(costs.len() - 1)],
            _ => 100.0,
        }
    }
}

impl DatabaseConnector for ScriptedConnector {
    fn simulate_index(&mut self, index: &Index) -> ConnectorResult<HypotheticalIndex> {
        self.simulate_calls += 1;
        let oid = self.next_oid;
        self.next_oid += 1;
        self.simulated.insert(oid, index.clone());
        Ok(HypotheticalIndex { oid, name: Self::name(oid, index) })
    }

    fn drop_simulated_index(&mut self, oid: u32) -> ConnectorResult<()> {
        self.drop_calls += 1;
        self.simulated.remove(&oid).map(|_| ()).ok_or(ConnectorError::UnknownHypotheticalIndex(oid))
    }

    fn estimated_index_size(&mut self, oid: u32) -> ConnectorResult<u64> {
        self.simulated
            .get(&oid)
            .map(|index| index.width() as u64 * BYTES_PER_COLUMN)
            .ok_or(ConnectorError::UnknownHypotheticalIndex(oid))
    }

    fn get_cost(&mut self, query: &Query) -> ConnectorResult<f64> {
        self.cost_calls += 1;
        Ok(self.get_plan(query)?.total_cost)
    }

    fn get_plan(&mut self, query: &Query) -> ConnectorResult<QueryPlan> {
        let best = self
            .simulated
            .iter()
            .map(|(oid, index)| (Self::usable_prefix(query, index), *oid, index))
            .filter(|(prefix, _, _)| *prefix > 0)
            .min_by(|a, b| self.cost_with_prefix(query, a.0).total_cmp(&self.cost_with_prefix(query, b.0)).then(a.1.cmp(&b.1)));

        let node = match best {
            Some((prefix, oid, index)) => PlanNode {
                operation: PlanOperation::IndexScan {
                    table: index.table().unwrap_or_default().to_string(),
                    index: Self::name(oid, index),
                },
                estimated_rows: 1.0,
                estimated_cost: self.cost_with_prefix(query, prefix),
            },
            None => PlanNode {
                operation: PlanOperation::SeqScan { table: String::new() },
                estimated_rows: 1.0,
                estimated_cost: self.cost_with_prefix(query, 0),
            },
        };
        Ok(QueryPlan::new(vec![node]))
    }

    fn drop_indexes(&mut self) -> ConnectorResult<()> {
        self.drop_indexes_calls += 1;
        Ok(())
    }

    fn exec_only(&mut self, statement: &str) -> ConnectorResult<()> {
        Err(ConnectorError::Unsupported(statement.to_string()))
    }

    fn exec_fetch(&mut self, statement: &str) -> ConnectorResult<Vec<Row>> {
        Err(ConnectorError::Unsupported(statement.to_string()))
    }

    fn commit(&mut self) -> ConnectorResult<()> {
        Ok(())
    }

    fn rollback(&mut self) -> ConnectorResult<()> {
        Ok(())
    }

    fn close(&mut self) -> ConnectorResult<()> {
        Ok(())
    }
}

/// Columns `Col0..ColN` of a fresh table.
pub(crate) fn table_columns(table: &str, count: usize) -> Vec<Column> {
    let mut table = Table::new(table);
    table.add_columns((0..count).map(|i| Column::new(&format!("Col{i}"))))
}

pub(crate) fn query(nr: u32, columns: &[&Column]) -> Query {
    let predicate = columns.iter().map(|column| format!("{} = {nr}", column.name())).collect::<Vec<_>>().join(" AND ");
    Query::new(nr, &format!("SELECT * FROM t WHERE {predicate}"), columns.iter().map(|column| (*column).clone()).collect())
}

pub(crate) fn index(columns: &[&Column]) -> Index {
    Index::new(columns.iter().map(|column| (*column).clone()).collect()).unwrap()
}
