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

//! Cost evaluation benchmarks
//!
//! Compares a cold evaluation, which reconciles the session and asks the oracle for every
//! query, with a warm one that answers from the cost cache.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dotindex_common::{Column, Index, Query, Table, Workload};
use dotindex_core::connector::TableStatistics;
use dotindex_core::{CostEvaluation, ModelConnector};
use std::collections::HashMap;
use std::time::Duration;

const TABLES: usize = 4;
const COLUMNS_PER_TABLE: usize = 8;

fn fixture() -> (ModelConnector, Workload, Vec<Index>) {
    let mut statistics = HashMap::new();
    let mut columns = Vec::new();
    for t in 0..TABLES {
        let name = format!("t{t}");
        let mut table = Table::new(&name);
        let mut table_statistics = TableStatistics::new(100_000 * (t as u64 + 1));
        for c in 0..COLUMNS_PER_TABLE {
            let column = format!("c{c}");
            table_statistics = table_statistics.with_column(&column, 10u64.pow(c as u32 % 6 + 1), 4 + c as u64);
            columns.push(table.add_column(Column::new(&column)));
        }
        statistics.insert(name, table_statistics);
    }

    let queries = (0..64)
        .map(|nr| {
            let referenced: Vec<Column> = (0..3).map(|k| columns[(nr * 7 + k * 5) % columns.len()].clone()).collect();
            Query::new(nr as u32, &format!("SELECT * FROM bench WHERE q = {nr}"), referenced)
        })
        .collect();
    let workload = Workload::new(queries, "bench");
    let candidates = workload.potential_indexes();

    (ModelConnector::new("bench", statistics), workload, candidates)
}

fn bench_cost_evaluation(c: &mut Criterion) {
    let (mut connector, workload, candidates) = fixture();

    let mut group = c.benchmark_group("calculate_cost");
    group.measurement_time(Duration::from_secs(5));

    for size in [1, 4, 16] {
        let configuration: Vec<Index> = candidates.iter().take(size).cloned().collect();

        group.bench_with_input(BenchmarkId::new("uncached", size), &configuration, |b, configuration| {
            b.iter(|| {
                let mut evaluation = CostEvaluation::new(&mut connector);
                let cost = evaluation.calculate_cost(&workload, configuration, false);
                let _ = evaluation.complete_cost_estimation();
                black_box(cost)
            });
        });

        group.bench_with_input(BenchmarkId::new("cached", size), &configuration, |b, configuration| {
            let mut evaluation = CostEvaluation::new(&mut connector);
            let _ = evaluation.calculate_cost(&workload, configuration, false);
            b.iter(|| black_box(evaluation.calculate_cost(&workload, configuration, false)));
            let _ = evaluation.complete_cost_estimation();
        });
    }

    group.finish();
}

fn bench_reconciliation(c: &mut Criterion) {
    let (mut connector, workload, candidates) = fixture();
    let mut evaluation = CostEvaluation::new(&mut connector);

    // Alternating configurations that differ in one index keep the session churning
    let first: Vec<Index> = candidates.iter().take(8).cloned().collect();
    let second: Vec<Index> = candidates.iter().skip(1).take(8).cloned().collect();

    c.bench_function("reconcile_alternating", |b| {
        b.iter(|| {
            black_box(evaluation.calculate_cost(&workload, &first, false).ok());
            black_box(evaluation.calculate_cost(&workload, &second, false).ok());
        });
    });

    let _ = evaluation.complete_cost_estimation();
}

criterion_group!(benches, bench_cost_evaluation, bench_reconciliation);
criterion_main!(benches);
