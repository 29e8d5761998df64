//! End-to-end runs of every selection algorithm against the statistics-driven oracle.

use dotindex_common::units::mb_to_b;
use dotindex_common::{Column, Index, Query, Table, Workload};
use dotindex_core::connector::TableStatistics;
use dotindex_core::{AlgorithmKind, ConnectorError, CostEvaluation, DatabaseConnector, ModelConnector, Parameters, SelectionError, Session};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

struct Schema {
    orders: Vec<Column>,
    customer: Vec<Column>,
}

fn schema() -> Schema {
    let mut orders = Table::new("orders");
    let mut customer = Table::new("customer");
    Schema {
        orders: orders.add_columns(["o_custkey", "o_orderdate", "o_status", "o_total"].map(Column::new)),
        customer: customer.add_columns(["c_custkey", "c_nation", "c_segment"].map(Column::new)),
    }
}

fn connector() -> ModelConnector {
    let tables = HashMap::from([
        (
            "orders".to_string(),
            TableStatistics::new(1_000_000)
                .with_column("o_custkey", 100_000, 8)
                .with_column("o_orderdate", 2_400, 4)
                .with_column("o_status", 3, 1)
                .with_column("o_total", 900_000, 8),
        ),
        (
            "customer".to_string(),
            TableStatistics::new(100_000).with_column("c_custkey", 100_000, 8).with_column("c_nation", 25, 4).with_column("c_segment", 5, 10),
        ),
    ]);
    ModelConnector::new("shop", tables)
}

fn workload(schema: &Schema) -> Workload {
    let [o_custkey, o_orderdate, o_status, o_total] = [0, 1, 2, 3].map(|i| schema.orders[i].clone());
    let [c_custkey, c_nation, c_segment] = [0, 1, 2].map(|i| schema.customer[i].clone());
    Workload::new(
        vec![
            Query::new(1, "SELECT * FROM orders WHERE o_custkey = 42", vec![o_custkey.clone()]),
            Query::new(2, "SELECT * FROM orders WHERE o_orderdate = '1995-03-15' AND o_status = 'F'", vec![o_orderdate.clone(), o_status]),
            Query::new(3, "SELECT SUM(o_total) FROM orders WHERE o_orderdate = '1996-01-01'", vec![o_orderdate, o_total]),
            Query::new(
                4,
                "SELECT * FROM customer, orders WHERE c_custkey = o_custkey AND c_nation = 7 AND c_segment = 'BUILDING'",
                vec![c_custkey, c_nation, c_segment, o_custkey],
            ),
        ],
        "shop",
    )
}

fn parameters(value: serde_json::Value) -> Parameters {
    value.as_object().cloned().unwrap_or_default()
}

fn parameters_for(kind: AlgorithmKind) -> Parameters {
    match kind {
        AlgorithmKind::NoIndex | AlgorithmKind::AllIndexes => Parameters::new(),
        AlgorithmKind::DropHeuristic => parameters(json!({"max_indexes": 3})),
        AlgorithmKind::Microsoft => parameters(json!({"max_indexes": 3, "max_index_columns": 2})),
        AlgorithmKind::Relaxation => parameters(json!({"budget_MB": 30, "max_index_columns": 2})),
        AlgorithmKind::Ibm => parameters(json!({"budget": 100, "try_variation_seconds_limit": 0, "seed": 7})),
        AlgorithmKind::Epic => parameters(json!({"budget_mb": 100})),
        AlgorithmKind::DtaAnytime => parameters(json!({"budget_mb": 100, "max_index_columns": 2})),
    }
}

fn workload_cost(connector: &mut ModelConnector, workload: &Workload, indexes: &BTreeSet<Index>) -> f64 {
    let mut evaluation = CostEvaluation::new(connector);
    let cost = evaluation.calculate_cost(workload, indexes, false).unwrap();
    evaluation.complete_cost_estimation().unwrap();
    cost
}

#[test]
fn test_every_algorithm_runs_end_to_end() {
    let schema = schema();
    let workload = workload(&schema);
    let indexable: BTreeSet<Column> = workload.indexable_columns().into_iter().collect();
    let mut session = Session::open(connector());
    let cost_without_indexes = workload_cost(&mut session, &workload, &BTreeSet::new());

    for kind in AlgorithmKind::ALL {
        let mut algorithm = kind.create(&mut *session, &parameters_for(kind)).unwrap();
        let indexes = algorithm.calculate_best_indexes(&workload).unwrap();
        let statistics = algorithm.cost_statistics();
        drop(algorithm);

        assert_eq!(session.hypothetical_indexes().count(), 0, "{kind} left hypothetical indexes behind");
        assert!(indexes.iter().all(|index| index.columns().iter().all(|column| indexable.contains(column))), "{kind}");
        assert!(statistics.cache_hits <= statistics.cost_requests);

        let cost = workload_cost(&mut session, &workload, &indexes);
        assert!(cost <= cost_without_indexes, "{kind}: {cost} > {cost_without_indexes}");
    }

    session.close().unwrap();
}

#[test]
fn test_baselines() {
    let schema = schema();
    let workload = workload(&schema);
    let mut session = Session::open(connector());

    let mut no_index = AlgorithmKind::NoIndex.create(&mut *session, &Parameters::new()).unwrap();
    assert!(no_index.calculate_best_indexes(&workload).unwrap().is_empty());
    drop(no_index);

    let mut all_indexes = AlgorithmKind::AllIndexes.create(&mut *session, &Parameters::new()).unwrap();
    let indexes = all_indexes.calculate_best_indexes(&workload).unwrap();
    assert_eq!(indexes, workload.potential_indexes().into_iter().collect());
    assert_eq!(indexes.len(), 7);
}

#[test]
fn test_selective_predicate_gets_an_index() {
    let schema = schema();
    let workload = workload(&schema);
    let mut session = Session::open(connector());

    for kind in [AlgorithmKind::DropHeuristic, AlgorithmKind::Microsoft, AlgorithmKind::Ibm] {
        let mut algorithm = kind.create(&mut *session, &parameters_for(kind)).unwrap();
        let indexes = algorithm.calculate_best_indexes(&workload).unwrap();
        assert!(indexes.iter().any(|index| index.leading_column() == &schema.orders[0]), "{kind}: {indexes:?}");
    }
}

#[test]
fn test_budgeted_algorithms_stay_within_budget() {
    let schema = schema();
    let workload = workload(&schema);
    let mut session = Session::open(connector());
    let budget = mb_to_b(30.0) as u64;

    let budgeted = [
        (AlgorithmKind::Relaxation, parameters(json!({"budget_mb": 30, "max_index_columns": 2}))),
        (AlgorithmKind::Ibm, parameters(json!({"budget_mb": 30, "try_variation_seconds_limit": 0.05, "seed": 7}))),
        (AlgorithmKind::Epic, parameters(json!({"budget_mb": 30}))),
        (AlgorithmKind::DtaAnytime, parameters(json!({"budget_mb": 30, "max_index_columns": 2}))),
    ];
    for (kind, config) in budgeted {
        let mut algorithm = kind.create(&mut *session, &config).unwrap();
        let indexes = algorithm.calculate_best_indexes(&workload).unwrap();
        drop(algorithm);

        let total_size: u64 = indexes.iter().map(|index| session.index_size(index).unwrap()).sum();
        assert!(total_size <= budget, "{kind}: {total_size} > {budget}");
        assert!(indexes.iter().all(|index| index.estimated_size().is_some()), "{kind}");
    }

    let mut drop_heuristic = AlgorithmKind::DropHeuristic.create(&mut *session, &parameters(json!({"budget_mb": 10}))).unwrap();
    let indexes = drop_heuristic.calculate_best_indexes(&workload).unwrap();
    drop(drop_heuristic);
    let total_size: u64 = indexes.iter().map(|index| session.index_size(index).unwrap()).sum();
    assert!(total_size <= mb_to_b(10.0) as u64);
}

#[test]
fn test_algorithm_runs_only_once() {
    let schema = schema();
    let workload = workload(&schema);
    let mut session = Session::open(connector());

    let mut algorithm = AlgorithmKind::Microsoft.create(&mut *session, &Parameters::new()).unwrap();
    algorithm.calculate_best_indexes(&workload).unwrap();
    assert!(matches!(algorithm.calculate_best_indexes(&workload), Err(SelectionError::InvalidState(_))));
}

#[test]
fn test_invalid_parameters_fail_before_running() {
    let mut session = Session::open(connector());

    let unknown_key = AlgorithmKind::DropHeuristic.create(&mut *session, &parameters(json!({"max_index": 3})));
    assert!(matches!(unknown_key, Err(SelectionError::InvalidConfiguration(_))));
    drop(unknown_key);

    let empty_transformations = AlgorithmKind::Relaxation.create(&mut *session, &parameters(json!({"transformations": []})));
    assert!(matches!(empty_transformations, Err(SelectionError::InvalidConfiguration(_))));
    drop(empty_transformations);

    let negative_budget = AlgorithmKind::Epic.create(&mut *session, &parameters(json!({"budget_mb": -1})));
    assert!(matches!(negative_budget, Err(SelectionError::InvalidConfiguration(_))));

    assert!(matches!("greedy".parse::<AlgorithmKind>(), Err(SelectionError::InvalidConfiguration(_))));
}

#[test]
fn test_closed_session_rejects_requests() {
    let mut connector = connector();
    DatabaseConnector::close(&mut connector).unwrap();
    assert!(connector.is_closed());

    let algorithm = AlgorithmKind::AllIndexes.create(&mut connector, &Parameters::new());
    assert!(matches!(algorithm, Err(SelectionError::Connector(ConnectorError::SessionClosed))));
}
