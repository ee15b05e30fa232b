//! Loader Service - Loads cadastral JSON exports into Postgres
//!
//! Responsibilities:
//! - Read export files and repair mis-decoded text
//! - Detect the entity type of each file from its first record
//! - Normalize nested records into flat rows
//! - Null references to rows that do not exist yet
//! - Upsert in chunked or per-record transactions and report counts
//!
//! Re-running the same file converges to the same rows (last write wins).

mod coerce;
mod config;
mod dispatch;
mod encoding;
mod entity;
mod error;
mod filter;
mod ingest;
mod memory;
mod municipio;
mod normalize;
mod postgres;
mod record;
mod runner;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::ingest::load_file;
use crate::memory::MemoryStore;
use crate::postgres::PgStore;
use crate::runner::BatchRunner;
use crate::store::Store;

#[derive(Parser, Debug)]
#[command(name = "loader", about = "Loads cadastral JSON exports into Postgres")]
struct Args {
    /// Export files to load, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Records per transaction for chunked entities (overrides CHUNK_SIZE)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Target schema (overrides PGSCHEMA)
    #[arg(long)]
    schema: Option<String>,

    /// Load the municipalities embedded in each file before its records
    #[arg(long, default_value = "false")]
    municipios: bool,

    /// Dry run - load into an in-memory store, don't touch the database
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Print the per-file reports as JSON on stdout
    #[arg(long, default_value = "false")]
    json: bool,

    /// Stop at the first file that fails
    #[arg(long, default_value = "false")]
    fail_fast: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn log_error(err: &anyhow::Error) {
    error!(error = %err, "load failed");
    for cause in err.chain().skip(1) {
        error!(cause = %cause, "caused by");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(err) = run(Args::parse()).await {
        log_error(&err);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(schema) = args.schema {
        config.schema = schema;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size.max(1);
    }

    info!(
        schema = %config.schema,
        chunk_size = config.chunk_size,
        mode = if args.dry_run { "dry-run" } else { "live" },
        files = args.files.len(),
        "loader starting"
    );

    let memory = MemoryStore::new(config.schema.as_str());
    let pg;
    let store: &dyn Store = if args.dry_run {
        &memory
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(config.db_url()?)
            .await
            .context("Failed to connect to database")?;
        pg = PgStore::new(pool, config.schema.as_str());
        &pg
    };
    let runner = BatchRunner::new(store, config.chunk_size);

    let mut reports = Vec::with_capacity(args.files.len());
    let mut failed = 0;
    for path in &args.files {
        match load_file(&runner, path, args.municipios).await {
            Ok(loaded) => {
                let (succeeded, skipped) = loaded.report.counts();
                info!(
                    path = %path.display(),
                    entity = %loaded.report.entity,
                    succeeded,
                    skipped,
                    "file loaded"
                );
                reports.push(loaded);
            }
            Err(e) if e.is_empty_payload() => {
                warn!(path = %path.display(), "no records in file; nothing to load");
            }
            Err(e) if args.fail_fast => return Err(e.into()),
            Err(e) => {
                log_error(&anyhow::Error::new(e));
                failed += 1;
            }
        }
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?
        );
    }

    let (succeeded, skipped) = reports.iter().fold((0, 0), |(ok, skip), r| {
        let (s, k) = r.report.counts();
        (ok + s, skip + k)
    });
    info!(succeeded, skipped, failed_files = failed, "done");

    if args.dry_run {
        for loaded in &reports {
            let table = loaded.report.entity.to_string();
            info!(table = %table, rows = memory.row_count(&table), "dry-run rows");
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed", args.files.len());
    }
    Ok(())
}
