// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HDDS Log Sink CLI
//!
//! Replay JSON-lines log records into a local table.
//!
//! # Usage
//!
//! ```bash
//! # Replay a file into ./tables/<dataset>/<table>.ndjson
//! hdds-log-sink --config sink.yaml --input app.log.jsonl --store-dir ./tables --create-table
//!
//! # Read records from stdin, 100 per insert call
//! cat app.log.jsonl | hdds-log-sink --config sink.yaml --batch-size 100
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use hdds_log_sink::{LogHandler, LogRecord, NdjsonTableStore, SinkConfig, TableSink};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hdds-log-sink")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay JSON-lines log records into a table store")]
#[command(long_about = None)]
struct Cli {
    /// Sink configuration (YAML)
    #[arg(short, long)]
    config: PathBuf,

    /// Input file with one JSON record per line (use - for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Root directory of the local table store
    #[arg(short, long, default_value = "tables")]
    store_dir: PathBuf,

    /// Create the destination table if it does not exist
    #[arg(long)]
    create_table: bool,

    /// Records per insert call
    #[arg(short, long, default_value = "500")]
    batch_size: usize,

    /// Verbose mode (show internal logs)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("hdds_log_sink=debug")
    } else {
        EnvFilter::new("hdds_log_sink=info")
    };
    fmt().with_env_filter(filter).with_target(false).init();

    if cli.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }

    let config = SinkConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let store = NdjsonTableStore::new(&cli.store_dir, &config.table.dataset, &config.table.table);
    if cli.create_table {
        store.create_table().context("Failed to create table")?;
    }

    tracing::info!(
        table = %format!("{}.{}", config.table.dataset, config.table.table),
        path = %store.path().display(),
        min_level = config.min_level,
        "Starting HDDS Log Sink"
    );

    let sink = TableSink::from_config(store, &config);
    let reader = open_input(&cli.input)?;

    let mut batch = Vec::with_capacity(cli.batch_size);
    let mut lines_read = 0u64;
    let mut skipped = 0u64;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        lines_read += 1;

        let record = LogRecord::from_json_str(&line)
            .with_context(|| format!("Invalid record on line {}", idx + 1))?;

        let handling = sink
            .try_is_handling(&record)
            .context("Table existence check failed")?;
        if !handling {
            skipped += 1;
            continue;
        }

        batch.push(record);
        if batch.len() >= cli.batch_size {
            sink.handle_batch(&batch).context("Batch insert failed")?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        sink.handle_batch(&batch).context("Batch insert failed")?;
    }

    let stats = sink.stats();
    tracing::info!(
        records_read = lines_read,
        records_skipped = skipped,
        batches = stats.batches_submitted,
        rows_inserted = stats.rows_inserted,
        handling = ?sink.handling_state(),
        "Replay complete"
    );

    Ok(())
}

fn open_input(input: &str) -> Result<Box<dyn BufRead>> {
    if input == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = File::open(input).with_context(|| format!("Failed to open {}", input))?;
        Ok(Box::new(BufReader::new(file)))
    }
}
