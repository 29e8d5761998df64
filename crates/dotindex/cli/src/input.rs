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

//! Input files of the `dotindex` binary: the workload description and the run configuration.

use anyhow::{Context, Result, bail};
use dotindex_common::{Column, Query, Table, Workload};
use dotindex_core::connector::TableStatistics;
use dotindex_core::connector::model::DEFAULT_COLUMN_WIDTH;
use dotindex_core::{AlgorithmKind, ModelConnector, Parameters};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read {what} {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid {what} {}", path.display()))
}

/// Schema statistics plus queries. Query columns are written as `table.column`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadFile {
    pub database_name: String,
    pub tables: Vec<TableSpec>,
    pub queries: Vec<QuerySpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    pub name: String,
    pub row_count: u64,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub name: String,
    pub distinct_values: u64,
    pub width_bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuerySpec {
    pub nr: u32,
    pub text: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl WorkloadFile {
    pub fn load(path: &Path) -> Result<Self> {
        load_json(path, "workload file")
    }

    /// Binds the queries to the schema. With `filter` only the listed query numbers are kept.
    pub fn workload(&self, filter: Option<&[u32]>) -> Result<Workload> {
        let mut tables: HashMap<String, Table> = HashMap::new();
        for spec in &self.tables {
            let mut table = Table::new(&spec.name);
            table.add_columns(spec.columns.iter().map(|column| Column::new(&column.name)));
            if tables.insert(table.name().to_string(), table).is_some() {
                bail!("Table {} is defined twice", spec.name);
            }
        }

        let mut queries = Vec::with_capacity(self.queries.len());
        for spec in self.queries.iter().filter(|spec| filter.is_none_or(|nrs| nrs.contains(&spec.nr))) {
            let mut columns = Vec::with_capacity(spec.columns.len());
            for reference in &spec.columns {
                let column = reference
                    .split_once('.')
                    .and_then(|(table, column)| tables.get(&table.to_lowercase())?.column(column))
                    .with_context(|| format!("Query {} references unknown column {reference}", spec.nr))?;
                columns.push(column.clone());
            }
            queries.push(Query::new(spec.nr, &spec.text, columns));
        }

        if let Some(nrs) = filter
            && let Some(missing) = nrs.iter().find(|nr| !queries.iter().any(|query| query.nr == **nr))
        {
            bail!("Query {missing} is not part of the workload");
        }
        Ok(Workload::new(queries, &self.database_name))
    }

    pub fn connector(&self) -> ModelConnector {
        let tables = self
            .tables
            .iter()
            .map(|spec| {
                let statistics = spec.columns.iter().fold(TableStatistics::new(spec.row_count), |statistics, column| {
                    statistics.with_column(&column.name, column.distinct_values, column.width_bytes.unwrap_or(DEFAULT_COLUMN_WIDTH))
                });
                (spec.name.clone(), statistics)
            })
            .collect();
        ModelConnector::new(&self.database_name, tables)
    }
}

/// Which algorithms to run, and optionally which queries of the workload to use.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub queries: Option<Vec<u32>>,
    pub algorithms: Vec<AlgorithmConfig>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load_json(path, "run configuration")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlgorithmConfig {
    pub name: AlgorithmKind,
    #[serde(default)]
    pub parameters: Parameters,
}

fn integer_list(value: &Value) -> Option<Vec<i64>> {
    let values = value.as_array().filter(|values| !values.is_empty())?;
    values.iter().map(Value::as_i64).collect()
}

/// One configuration per value of the parameter range, if there is one.
///
/// A list of integers is a range: `[a, b]` stands for every integer from `a` to `b`, a
/// longer list is taken as is. Other lists, like relaxation transformations, are plain
/// values. At most one range per algorithm is allowed.
pub fn expand_parameter_range(config: &AlgorithmConfig) -> Result<Vec<AlgorithmConfig>> {
    let ranges: Vec<(&String, Vec<i64>)> = config.parameters.iter().filter_map(|(key, value)| integer_list(value).map(|values| (key, values))).collect();

    match ranges.as_slice() {
        [] => Ok(vec![config.clone()]),
        [(key, values)] => {
            let values: Vec<i64> = match values.as_slice() {
                [start, end] => (*start..=*end).collect(),
                _ => values.clone(),
            };
            if values.is_empty() {
                bail!("Parameter range of {key} for {} is empty", config.name);
            }

            Ok(values
                .into_iter()
                .map(|value| {
                    let mut unfolded = config.clone();
                    unfolded.parameters.insert((*key).clone(), Value::from(value));
                    unfolded
                })
                .collect())
        }
        _ => bail!("Too many parameter ranges in the configuration of {}", config.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WORKLOAD: &str = r#"{
        "database_name": "shop",
        "tables": [
            {"name": "Orders", "row_count": 1000, "columns": [
                {"name": "o_custkey", "distinct_values": 100, "width_bytes": 8},
                {"name": "o_status", "distinct_values": 3}
            ]},
            {"name": "customer", "row_count": 100, "columns": [{"name": "c_custkey", "distinct_values": 100}]}
        ],
        "queries": [
            {"nr": 1, "text": "SELECT * FROM orders WHERE o_custkey = 1", "columns": ["orders.o_custkey"]},
            {"nr": 2, "text": "SELECT * FROM orders, customer WHERE o_custkey = c_custkey", "columns": ["orders.o_custkey", "customer.c_custkey"]},
            {"nr": 3, "text": "SELECT COUNT(*) FROM orders"}
        ]
    }"#;

    fn algorithm(parameters: Value) -> AlgorithmConfig {
        AlgorithmConfig {
            name: AlgorithmKind::Microsoft,
            parameters: parameters.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_workload_binds_columns() {
        let file: WorkloadFile = serde_json::from_str(WORKLOAD).unwrap();
        let workload = file.workload(None).unwrap();

        assert_eq!(workload.len(), 3);
        assert_eq!(workload.database_name, "shop");
        assert_eq!(workload.queries[1].columns.len(), 2);
        assert_eq!(workload.queries[0].columns[0].qualified_name(), "orders.o_custkey");
        assert!(workload.queries[2].columns.is_empty());
        assert_eq!(workload.indexable_columns().len(), 2);
    }

    #[test]
    fn test_query_filter() {
        let file: WorkloadFile = serde_json::from_str(WORKLOAD).unwrap();
        let workload = file.workload(Some(&[1, 3])).unwrap();
        assert_eq!(workload.queries.iter().map(|query| query.nr).collect::<Vec<_>>(), vec![1, 3]);

        assert!(file.workload(Some(&[4])).is_err());
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let mut file: WorkloadFile = serde_json::from_str(WORKLOAD).unwrap();
        file.queries[0].columns.push("orders.o_total".to_string());
        let error = file.workload(None).unwrap_err();
        assert!(error.to_string().contains("orders.o_total"));

        file.queries[0].columns = vec!["o_custkey".to_string()];
        assert!(file.workload(None).is_err());
    }

    #[test]
    fn test_connector_uses_statistics() {
        let file: WorkloadFile = serde_json::from_str(WORKLOAD).unwrap();
        let workload = file.workload(None).unwrap();
        let connector = file.connector();

        assert_eq!(connector.database_name(), "shop");
        let index = workload.potential_indexes().remove(0);
        assert!(connector.index_size(&index).unwrap() > 0);
    }

    #[test]
    fn test_no_range() {
        let config = algorithm(json!({"max_indexes": 5}));
        assert_eq!(expand_parameter_range(&config).unwrap(), vec![config]);
    }

    #[test]
    fn test_two_element_range_is_inclusive() {
        let configs = expand_parameter_range(&algorithm(json!({"max_indexes": [2, 4], "max_index_columns": 2}))).unwrap();
        let values: Vec<&Value> = configs.iter().map(|config| &config.parameters["max_indexes"]).collect();
        assert_eq!(values, vec![&json!(2), &json!(3), &json!(4)]);
        assert!(configs.iter().all(|config| config.parameters["max_index_columns"] == json!(2)));
    }

    #[test]
    fn test_longer_list_is_explicit() {
        let configs = expand_parameter_range(&algorithm(json!({"budget_mb": [100, 500, 250]}))).unwrap();
        let values: Vec<i64> = configs.iter().filter_map(|config| config.parameters["budget_mb"].as_i64()).collect();
        assert_eq!(values, vec![100, 500, 250]);
    }

    #[test]
    fn test_non_integer_lists_are_values() {
        let config = AlgorithmConfig {
            name: AlgorithmKind::Relaxation,
            parameters: json!({"transformations": ["removal", "merging"], "budget_mb": [1, 2]}).as_object().cloned().unwrap_or_default(),
        };
        let configs = expand_parameter_range(&config).unwrap();
        assert_eq!(configs.len(), 2);
        assert!(configs.iter().all(|config| config.parameters["transformations"] == json!(["removal", "merging"])));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(expand_parameter_range(&algorithm(json!({"max_indexes": [2, 4], "max_indexes_naive": [1, 2]}))).is_err());
        assert!(expand_parameter_range(&algorithm(json!({"max_indexes": [4, 2]}))).is_err());
    }

    #[test]
    fn test_run_config() {
        let config: RunConfig = serde_json::from_str(r#"{"algorithms": [{"name": "drop_heuristic", "parameters": {"max_indexes": 3}}, {"name": "no_index"}]}"#).unwrap();
        assert_eq!(config.algorithms[0].name, AlgorithmKind::DropHeuristic);
        assert!(config.algorithms[1].parameters.is_empty());
        assert!(config.queries.is_none());

        assert!(serde_json::from_str::<RunConfig>(r#"{"algorithms": [{"name": "cophy"}]}"#).is_err());
    }
}
