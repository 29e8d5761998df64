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

//! Statistics-driven what-if oracle.
//!
//! `ModelConnector` answers the connector contract in-process from catalog statistics,
//! so selection algorithms can run without a live database. Every referenced column is
//! treated as an equality filter with selectivity `1 / distinct_values`. Per table the
//! cheapest access path wins: a sequential scan, or a scan of a hypothetical index whose
//! leading column is referenced, narrowed by the longest referenced prefix.

use dotindex_common::{Column, Index, Query};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::plan::{PlanNode, PlanOperation, QueryPlan};
use super::{ConnectorError, ConnectorResult, DatabaseConnector, HypotheticalIndex, Row};
use crate::cost_model::{CostModel, OperationCost, PAGE_SIZE};

/// Selectivity assumed for columns without statistics.
pub const DEFAULT_SELECTIVITY: f64 = 0.1;
/// Width assumed for columns without statistics.
pub const DEFAULT_COLUMN_WIDTH: u64 = 8;
const TUPLE_HEADER_BYTES: u64 = 24;
const INDEX_TUPLE_OVERHEAD_BYTES: u64 = 16;
const INDEX_FILL_FACTOR: f64 = 0.9;
const FIRST_HYPOTHETICAL_OID: u32 = 16384;

fn default_width() -> u64 {
    DEFAULT_COLUMN_WIDTH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub distinct_values: u64,
    #[serde(default = "default_width")]
    pub width_bytes: u64,
}

impl ColumnStatistics {
    pub fn selectivity(&self) -> f64 {
        1.0 / self.distinct_values.max(1) as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStatistics {
    pub row_count: u64,
    #[serde(default)]
    pub columns: HashMap<String, ColumnStatistics>,
}

impl TableStatistics {
    pub fn new(row_count: u64) -> Self {
        Self {
            row_count,
            columns: HashMap::new(),
        }
    }

    pub fn with_column(mut self, name: &str, distinct_values: u64, width_bytes: u64) -> Self {
        self.columns.insert(name.to_lowercase(), ColumnStatistics { distinct_values, width_bytes });
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.columns.get(name)
    }

    pub fn page_count(&self) -> u64 {
        let row_width = TUPLE_HEADER_BYTES + self.columns.values().map(|column| column.width_bytes).sum::<u64>();
        (self.row_count * row_width).div_ceil(PAGE_SIZE).max(1)
    }

    fn selectivity(&self, column: &Column) -> f64 {
        self.column(column.name()).map(ColumnStatistics::selectivity).unwrap_or(DEFAULT_SELECTIVITY)
    }

    fn width(&self, column: &Column) -> u64 {
        self.column(column.name()).map(|statistics| statistics.width_bytes).unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    fn combined_selectivity<'a>(&self, columns: impl IntoIterator<Item = &'a Column>) -> f64 {
        columns.into_iter().map(|column| self.selectivity(column)).fold(1.0, |acc, selectivity| acc * selectivity)
    }
}

pub struct ModelConnector {
    database_name: String,
    tables: HashMap<String, TableStatistics>,
    cost_model: CostModel,
    hypothetical: BTreeMap<u32, Index>,
    next_oid: u32,
    closed: bool,
}

impl ModelConnector {
    pub fn new(database_name: &str, tables: HashMap<String, TableStatistics>) -> Self {
        let tables = tables
            .into_iter()
            .map(|(name, mut statistics)| {
                statistics.columns = statistics.columns.into_iter().map(|(column, stats)| (column.to_lowercase(), stats)).collect();
                (name.to_lowercase(), statistics)
            })
            .collect();

        Self {
            database_name: database_name.to_string(),
            tables,
            cost_model: CostModel::new(),
            hypothetical: BTreeMap::new(),
            next_oid: FIRST_HYPOTHETICAL_OID,
            closed: false,
        }
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Hypothetical indexes currently alive in this session.
    pub fn hypothetical_indexes(&self) -> impl Iterator<Item = &Index> {
        self.hypothetical.values()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Estimated size in bytes of a B-tree over `index`, metapage included.
    pub fn index_size(&self, index: &Index) -> ConnectorResult<u64> {
        let statistics = self.table_statistics(index.table())?;
        let key_width: u64 = index.columns().iter().map(|column| statistics.width(column)).sum();
        let bytes = (statistics.row_count * (key_width + INDEX_TUPLE_OVERHEAD_BYTES)) as f64 / INDEX_FILL_FACTOR;
        let pages = (bytes / PAGE_SIZE as f64).ceil() as u64 + 1;
        Ok(pages * PAGE_SIZE)
    }

    fn ensure_open(&self) -> ConnectorResult<()> {
        if self.closed {
            return Err(ConnectorError::SessionClosed);
        }
        Ok(())
    }

    fn table_statistics(&self, table: Option<&str>) -> ConnectorResult<&TableStatistics> {
        let table = table.unwrap_or_default();
        self.tables.get(table).ok_or_else(|| ConnectorError::UnknownTable(table.to_string()))
    }

    fn hypothetical_name(oid: u32, index: &Index) -> String {
        let columns = index.columns().iter().map(Column::name).collect::<Vec<_>>().join("_");
        format!("<{oid}>btree_{}_{columns}", index.table().unwrap_or_default())
    }

    fn best_access_path(&self, table: &str, statistics: &TableStatistics, columns: &[&Column]) -> ConnectorResult<PlanNode> {
        let rows = statistics.row_count as f64;
        let filtered_rows = rows * statistics.combined_selectivity(columns.iter().copied());
        let scan = self.cost_model.estimate_operation_cost(&OperationCost::TableScan {
            rows,
            pages: statistics.page_count(),
        });

        let mut best = PlanNode {
            operation: PlanOperation::SeqScan { table: table.to_string() },
            estimated_rows: filtered_rows,
            estimated_cost: scan.total_cost,
        };

        for (oid, index) in self.hypothetical.iter().filter(|(_, index)| index.table() == Some(table)) {
            let prefix: Vec<&Column> = index.columns().iter().take_while(|column| columns.contains(column)).collect();
            if prefix.is_empty() {
                continue;
            }

            let selectivity = statistics.combined_selectivity(prefix);
            let index_pages = self.index_size(index)? / PAGE_SIZE;
            let touched_pages = ((index_pages as f64 * selectivity).ceil() as u64).max(1);
            let cost = self.cost_model.estimate_operation_cost(&OperationCost::IndexScan {
                rows: rows * selectivity,
                index_pages: touched_pages,
            });

            if cost.total_cost < best.estimated_cost {
                best = PlanNode {
                    operation: PlanOperation::IndexScan {
                        table: table.to_string(),
                        index: Self::hypothetical_name(*oid, index),
                    },
                    estimated_rows: filtered_rows,
                    estimated_cost: cost.total_cost,
                };
            }
        }

        Ok(best)
    }
}

impl DatabaseConnector for ModelConnector {
    fn simulate_index(&mut self, index: &Index) -> ConnectorResult<HypotheticalIndex> {
        self.ensure_open()?;
        self.table_statistics(index.table())?;

        let oid = self.next_oid;
        self.next_oid += 1;
        self.hypothetical.insert(oid, index.clone());

        Ok(HypotheticalIndex {
            oid,
            name: Self::hypothetical_name(oid, index),
        })
    }

    fn drop_simulated_index(&mut self, oid: u32) -> ConnectorResult<()> {
        self.ensure_open()?;
        self.hypothetical.remove(&oid).map(|_| ()).ok_or(ConnectorError::UnknownHypotheticalIndex(oid))
    }

    fn estimated_index_size(&mut self, oid: u32) -> ConnectorResult<u64> {
        self.ensure_open()?;
        let index = self.hypothetical.get(&oid).ok_or(ConnectorError::UnknownHypotheticalIndex(oid))?;
        self.index_size(index)
    }

    fn get_cost(&mut self, query: &Query) -> ConnectorResult<f64> {
        Ok(self.get_plan(query)?.total_cost)
    }

    fn get_plan(&mut self, query: &Query) -> ConnectorResult<QueryPlan> {
        self.ensure_open()?;

        let mut columns_by_table: BTreeMap<&str, Vec<&Column>> = BTreeMap::new();
        for column in &query.columns {
            let table = column.table().ok_or_else(|| ConnectorError::CostUnavailable {
                query: query.nr,
                reason: format!("column {} is not bound to a table", column.name()),
            })?;
            columns_by_table.entry(table).or_default().push(column);
        }

        let mut nodes = Vec::with_capacity(columns_by_table.len());
        for (table, columns) in columns_by_table {
            let statistics = self.table_statistics(Some(table))?;
            nodes.push(self.best_access_path(table, statistics, &columns)?);
        }

        Ok(QueryPlan::new(nodes))
    }

    fn drop_indexes(&mut self) -> ConnectorResult<()> {
        self.ensure_open()?;
        debug!("Model session of {} holds no real indexes", self.database_name);
        Ok(())
    }

    fn exec_only(&mut self, statement: &str) -> ConnectorResult<()> {
        Err(ConnectorError::Unsupported(statement.to_string()))
    }

    fn exec_fetch(&mut self, statement: &str) -> ConnectorResult<Vec<Row>> {
        Err(ConnectorError::Unsupported(statement.to_string()))
    }

    fn commit(&mut self) -> ConnectorResult<()> {
        self.ensure_open()
    }

    fn rollback(&mut self) -> ConnectorResult<()> {
        self.ensure_open()
    }

    fn close(&mut self) -> ConnectorResult<()> {
        self.hypothetical.clear();
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotindex_common::Table;

    fn fixture() -> (ModelConnector, Vec<Column>) {
        let mut table = Table::new("lineitem");
        let columns = table.add_columns([Column::new("l_orderkey"), Column::new("l_shipdate"), Column::new("l_comment")]);
        let statistics = TableStatistics::new(1_000_000)
            .with_column("l_orderkey", 250_000, 4)
            .with_column("l_shipdate", 2_500, 4)
            .with_column("l_comment", 900_000, 44);
        let connector = ModelConnector::new("tpch", HashMap::from([("lineitem".to_string(), statistics)]));
        (connector, columns)
    }

    #[test]
    fn test_simulate_and_drop() {
        let (mut connector, columns) = fixture();
        let index = Index::single(columns[0].clone());

        let handle = connector.simulate_index(&index).unwrap();
        assert_eq!(handle.name, format!("<{}>btree_lineitem_l_orderkey", handle.oid));
        assert_eq!(connector.hypothetical_indexes().count(), 1);

        connector.drop_simulated_index(handle.oid).unwrap();
        assert_eq!(connector.hypothetical_indexes().count(), 0);
        assert_eq!(connector.drop_simulated_index(handle.oid), Err(ConnectorError::UnknownHypotheticalIndex(handle.oid)));
    }

    #[test]
    fn test_wider_indexes_are_larger() {
        let (mut connector, columns) = fixture();
        let narrow = connector.simulate_index(&Index::single(columns[0].clone())).unwrap();
        let wide = connector.simulate_index(&Index::new(vec![columns[0].clone(), columns[2].clone()]).unwrap()).unwrap();

        let narrow_size = connector.estimated_index_size(narrow.oid).unwrap();
        let wide_size = connector.estimated_index_size(wide.oid).unwrap();
        assert!(narrow_size > 0);
        assert_eq!(narrow_size % PAGE_SIZE, 0);
        assert!(wide_size > narrow_size);
    }

    #[test]
    fn test_index_lowers_cost_only_when_leading_column_is_referenced() {
        let (mut connector, columns) = fixture();
        let query = Query::new(1, "select * from lineitem where l_orderkey = 7", vec![columns[0].clone()]);
        let baseline = connector.get_cost(&query).unwrap();

        let unusable = connector.simulate_index(&Index::new(vec![columns[1].clone(), columns[0].clone()]).unwrap()).unwrap();
        assert_eq!(connector.get_cost(&query).unwrap(), baseline);

        let usable = connector.simulate_index(&Index::single(columns[0].clone())).unwrap();
        let plan = connector.get_plan(&query).unwrap();
        assert!(plan.total_cost < baseline);
        assert!(plan.uses_index(&usable.name));
        assert!(!plan.uses_index(&unusable.name));
    }

    #[test]
    fn test_composite_prefix_is_more_selective() {
        let (mut connector, columns) = fixture();
        let query = Query::new(2, "select * from lineitem where l_shipdate = 1 and l_orderkey = 2", vec![columns[0].clone(), columns[1].clone()]);

        let single = connector.simulate_index(&Index::single(columns[1].clone())).unwrap();
        let single_cost = connector.get_cost(&query).unwrap();
        connector.drop_simulated_index(single.oid).unwrap();

        connector.simulate_index(&Index::new(vec![columns[1].clone(), columns[0].clone()]).unwrap()).unwrap();
        assert!(connector.get_cost(&query).unwrap() < single_cost);
    }

    #[test]
    fn test_unknown_table_fails_loudly() {
        let (mut connector, _) = fixture();
        let mut orders = Table::new("orders");
        let column = orders.add_column(Column::new("o_orderdate"));
        let query = Query::new(3, "select * from orders where o_orderdate = 1", vec![column.clone()]);

        assert_eq!(connector.get_cost(&query), Err(ConnectorError::UnknownTable("orders".to_string())));
        assert!(connector.simulate_index(&Index::single(column)).is_err());
    }

    #[test]
    fn test_closed_session_rejects_calls() {
        let (mut connector, columns) = fixture();
        connector.simulate_index(&Index::single(columns[0].clone())).unwrap();
        connector.close().unwrap();

        assert!(connector.is_closed());
        assert_eq!(connector.hypothetical_indexes().count(), 0);
        let query = Query::new(1, "select 1", vec![columns[0].clone()]);
        assert_eq!(connector.get_cost(&query), Err(ConnectorError::SessionClosed));
    }
}
