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

//! DotIndex CLI Tool
//!
//! Runs index selection algorithms on a workload against the statistics-driven what-if
//! oracle and prints the selected indexes as JSON.

mod input;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotindex_common::units::b_to_mb;
use dotindex_common::{Index, Workload};
use dotindex_core::{AlgorithmKind, CostEvaluation, ModelConnector, Parameters, Session};
use input::{AlgorithmConfig, RunConfig, WorkloadFile, expand_parameter_range};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dotindex")]
#[command(about = "DotIndex - What-if index selection")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured algorithms on a workload
    Run {
        /// Workload file with table statistics and queries (JSON)
        #[arg(long, short = 'w')]
        workload: PathBuf,
        /// Run configuration listing the algorithms and their parameters (JSON)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },
    /// List the available algorithms
    Algorithms,
}

#[derive(Debug, Serialize)]
struct IndexReport {
    name: String,
    columns: Vec<String>,
    size_mb: Option<f64>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    algorithm: AlgorithmKind,
    parameters: Parameters,
    indexes: Vec<IndexReport>,
    total_size_mb: f64,
    cost_without_indexes: f64,
    cost_with_indexes: f64,
    calculation_time_s: f64,
    cost_requests: u64,
    cache_hits: u64,
    cache_hit_ratio: Option<f64>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { workload, config, pretty } => handle_run(&workload, &config, pretty),
        Commands::Algorithms => handle_algorithms(),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

fn handle_run(workload_path: &Path, config_path: &Path, pretty: bool) -> Result<()> {
    let workload_file = WorkloadFile::load(workload_path)?;
    let config = RunConfig::load(config_path)?;
    let workload = workload_file.workload(config.queries.as_deref())?;
    info!("Loaded workload of {} with {} queries", workload.database_name, workload.len());

    let mut session = Session::open(workload_file.connector());
    let mut reports = Vec::new();
    for algorithm_config in &config.algorithms {
        // There are multiple runs if a parameter range is configured
        for unfolded in expand_parameter_range(algorithm_config)? {
            reports.push(run_algorithm(&mut session, &workload, &unfolded)?);
        }
    }
    session.close().context("Failed to close the database session")?;

    let output = if pretty { serde_json::to_string_pretty(&reports)? } else { serde_json::to_string(&reports)? };
    println!("{output}");
    Ok(())
}

fn run_algorithm(connector: &mut ModelConnector, workload: &Workload, config: &AlgorithmConfig) -> Result<RunReport> {
    info!("Running algorithm {} with parameters {}", config.name, serde_json::Value::Object(config.parameters.clone()));

    let start = Instant::now();
    let mut algorithm = config.name.create(&mut *connector, &config.parameters).with_context(|| format!("Failed to set up {}", config.name))?;
    let indexes = algorithm.calculate_best_indexes(workload).with_context(|| format!("{} failed", config.name))?;
    let calculation_time_s = round2(start.elapsed().as_secs_f64());
    let statistics = algorithm.cost_statistics();
    drop(algorithm);
    info!("Indexes found: {}", indexes.iter().map(Index::to_string).collect::<Vec<_>>().join(", "));

    let mut evaluation = CostEvaluation::new(&mut *connector);
    let cost_without_indexes = evaluation.calculate_cost(workload, std::iter::empty::<&Index>(), false)?;
    let cost_with_indexes = evaluation.calculate_cost(workload, &indexes, true)?;
    let total_size = evaluation.total_size(&indexes)?;
    let index_reports = indexes
        .iter()
        .map(|index| IndexReport {
            name: index.idx_name(),
            columns: index.columns().iter().map(|column| column.qualified_name()).collect(),
            size_mb: evaluation.estimated_size(index).map(|size| round2(b_to_mb(size as f64))),
        })
        .collect();
    evaluation.complete_cost_estimation()?;

    Ok(RunReport {
        algorithm: config.name,
        parameters: config.parameters.clone(),
        indexes: index_reports,
        total_size_mb: round2(b_to_mb(total_size as f64)),
        cost_without_indexes: round2(cost_without_indexes),
        cost_with_indexes: round2(cost_with_indexes),
        calculation_time_s,
        cost_requests: statistics.cost_requests,
        cache_hits: statistics.cache_hits,
        cache_hit_ratio: statistics.hit_ratio(),
    })
}

fn handle_algorithms() -> Result<()> {
    for kind in AlgorithmKind::ALL {
        println!("{kind}");
    }
    Ok(())
}
