use accident_ingest::{
    discover::discover_sources,
    duck::{self, DuckSink},
    process, PipelineConfig,
};
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile yearly accident exports into one canonical table"
)]
struct Args {
    /// Directory holding the yearly exports
    #[arg(long, default_value = "./data")]
    input_dir: PathBuf,
    /// Glob relative to the input directory
    #[arg(long, default_value = "*.csv")]
    pattern: String,
    /// DuckDB file to write into
    #[arg(long, default_value = "accidents.duckdb")]
    db: PathBuf,
    /// YAML file overriding the built-in alias table and filter rules
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    table: Option<String>,
    /// Keep only accidents from these years (comma separated)
    #[arg(long, value_delimiter = ',')]
    years: Option<Vec<i32>>,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    let args = Args::parse();
    let start = Instant::now();

    // ─── 2) configuration ────────────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(n) = args.batch_size {
        if n == 0 {
            bail!("--batch-size must be at least 1");
        }
        config.batch_size = n;
    }
    if let Some(table) = args.table {
        config.table = table;
    }
    if let Some(years) = args.years {
        config.filter.years = Some(years);
    }

    // ─── 3) discover sources ─────────────────────────────────────────
    let sources = discover_sources(&args.input_dir, &args.pattern)?;
    if sources.is_empty() {
        warn!(
            "no files matching {} under {}; exit",
            args.pattern,
            args.input_dir.display()
        );
        return Ok(());
    }
    info!("{} sources to clean", sources.len());

    // ─── 4) clean + merge ────────────────────────────────────────────
    let run = process::process_all(&sources, &config)?;
    let report = &run.report;
    info!(
        sources = report.sources_processed,
        skipped = report.skipped_sources.len(),
        read = report.rows_read,
        kept = report.rows_kept,
        dropped = report.dropped(),
        missing_date = report.dropped_missing_date,
        invalid_token = report.dropped_invalid_token,
        unparseable_km = report.dropped_unparseable_km,
        outside_years = report.dropped_outside_years,
        fallback_dates = report.fallback_dates,
        malformed_lines = report.malformed_lines,
        "cleaning finished"
    );
    for skipped in &report.skipped_sources {
        error!("skipped {}: {}", skipped.path.display(), skipped.error);
    }

    // ─── 5) persist ──────────────────────────────────────────────────
    let conn = duck::open_disk_db(&args.db)?;
    let mut sink = DuckSink::new(conn, &config.table)?;
    let written = duck::write_all(&mut sink, &run.records, config.batch_size);
    for failure in &written.failures {
        error!(
            "batch {} ({} rows) rolled back: {}",
            failure.batch, failure.rows, failure.error
        );
    }

    info!(
        rows = written.rows_written,
        total_stored = sink.count()?,
        elapsed = ?start.elapsed(),
        "all done"
    );
    if !written.is_success() {
        bail!("{} batches failed to persist", written.failures.len());
    }
    Ok(())
}
