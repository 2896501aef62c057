//! qbench - benchmark-execution harness for query-answering engines
//!
//! Runs a matrix of (engine configuration × query × repetition), measures
//! per-run timing and correctness signals, and writes one JSON result file
//! per (configuration, query) cell.

#![forbid(unsafe_code)]

use std::io;
use std::sync::Arc;

use anyhow::Result;
use asupersync::runtime::RuntimeBuilder;
use clap::Parser;
use qbench::cli::Cli;
use qbench::config::Manifest;
use qbench::fetch::NullFetcher;
use qbench::matrix::MatrixDriver;
use qbench::replay::ReplayEngineFactory;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = main_impl() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn main_impl() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "qbench=debug" } else { "qbench=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut manifest = Manifest::load(&cli.manifest)?;
    cli.apply_overrides(&mut manifest)?;

    let driver = MatrixDriver::new(
        manifest,
        Arc::new(ReplayEngineFactory),
        Arc::new(NullFetcher),
    )?;

    let runtime = RuntimeBuilder::current_thread()
        .build()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let summary = runtime.block_on(driver.execute())?;

    info!(
        cells = summary.cells.len(),
        aborted = summary.aborted_cells(),
        failed_configs = summary.failed_configs.len(),
        "matrix finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
