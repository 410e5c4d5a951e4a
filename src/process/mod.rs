// src/process/mod.rs
pub mod convert;
pub mod date_parser;
pub mod filter;
pub mod merge;
pub mod reader;
pub mod utils;

use anyhow::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

use crate::{
    config::PipelineConfig,
    record::{CanonicalRecord, SourceDescriptor},
    schema::SchemaResolver,
};
use convert::normalize;
use filter::{DropReason, ValidityFilter};
use merge::{merge, MergedRun};
use reader::RawTable;

/// Row counters for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub malformed_lines: usize,
    pub dropped_missing_date: usize,
    pub dropped_invalid_token: usize,
    pub dropped_unparseable_km: usize,
    pub dropped_outside_years: usize,
    /// Rows whose date came from the file-name year rather than the row.
    pub fallback_dates: usize,
}

impl SourceReport {
    pub fn dropped(&self) -> usize {
        self.dropped_missing_date
            + self.dropped_invalid_token
            + self.dropped_unparseable_km
            + self.dropped_outside_years
    }

    fn count_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingDate => self.dropped_missing_date += 1,
            DropReason::InvalidToken(_) => self.dropped_invalid_token += 1,
            DropReason::UnparseableKm => self.dropped_unparseable_km += 1,
            DropReason::OutsideYearWindow => self.dropped_outside_years += 1,
        }
    }
}

/// A source that could not be read at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub error: String,
}

/// Counters summed over every source of a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sources_processed: usize,
    pub skipped_sources: Vec<SkippedSource>,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub malformed_lines: usize,
    pub dropped_missing_date: usize,
    pub dropped_invalid_token: usize,
    pub dropped_unparseable_km: usize,
    pub dropped_outside_years: usize,
    pub fallback_dates: usize,
}

impl RunReport {
    pub(crate) fn absorb(&mut self, source: &str, report: &SourceReport) {
        tracing::debug!(source, ?report, "merging source counters");
        self.sources_processed += 1;
        self.rows_read += report.rows_read;
        self.rows_kept += report.rows_kept;
        self.malformed_lines += report.malformed_lines;
        self.dropped_missing_date += report.dropped_missing_date;
        self.dropped_invalid_token += report.dropped_invalid_token;
        self.dropped_unparseable_km += report.dropped_unparseable_km;
        self.dropped_outside_years += report.dropped_outside_years;
        self.fallback_dates += report.fallback_dates;
    }

    pub fn dropped(&self) -> usize {
        self.dropped_missing_date
            + self.dropped_invalid_token
            + self.dropped_unparseable_km
            + self.dropped_outside_years
    }
}

/// Cleaned records of one source, in file order.
#[derive(Debug)]
pub struct SourceOutput {
    pub source: SourceDescriptor,
    pub records: Vec<CanonicalRecord>,
    pub report: SourceReport,
}

/// Resolve, normalize and filter an already-loaded table.
pub fn process_table(
    table: RawTable,
    source: SourceDescriptor,
    config: &PipelineConfig,
    filter: &ValidityFilter,
) -> SourceOutput {
    let binding = SchemaResolver::new(&config.schema).resolve(&table.headers);
    let absent = binding.absent_fields();
    if !absent.is_empty() {
        info!(source = %source.name, ?absent, "fields missing from source");
    }

    let mut report = SourceReport {
        rows_read: table.rows.len(),
        malformed_lines: table.malformed_lines,
        ..SourceReport::default()
    };

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let normalized = normalize(row, &binding, &source, config.km_policy);
        let from_fallback = normalized.date_from_fallback;
        match filter.check(normalized, &binding) {
            Ok(record) => {
                if from_fallback {
                    report.fallback_dates += 1;
                }
                records.push(record);
            }
            Err(reason) => report.count_drop(reason),
        }
    }
    report.rows_kept = records.len();

    SourceOutput {
        source,
        records,
        report,
    }
}

/// Read and clean one file.
#[tracing::instrument(level = "info", skip(path, config, filter), fields(path = %path.as_ref().display()))]
pub fn process_source<P: AsRef<Path>>(
    path: P,
    config: &PipelineConfig,
    filter: &ValidityFilter,
) -> Result<SourceOutput> {
    let start = Instant::now();
    let source = SourceDescriptor::from_path(path.as_ref());
    let table = reader::load_source(path.as_ref())?;
    let output = process_table(table, source, config, filter);
    info!(
        source = %output.source.name,
        read = output.report.rows_read,
        kept = output.report.rows_kept,
        dropped = output.report.dropped(),
        malformed = output.report.malformed_lines,
        elapsed = ?start.elapsed(),
        "source cleaned"
    );
    Ok(output)
}

/// Clean every source in parallel and merge the survivors. A source that
/// fails to read is logged and skipped; the rest still go through.
pub fn process_all(paths: &[PathBuf], config: &PipelineConfig) -> Result<MergedRun> {
    let filter = ValidityFilter::new(&config.filter)?;

    let results: Vec<(PathBuf, Result<SourceOutput>)> = paths
        .par_iter()
        .map(|p| (p.clone(), process_source(p, config, &filter)))
        .collect();

    let mut outputs = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for (path, result) in results {
        match result {
            Ok(output) => outputs.push(output),
            Err(e) => {
                error!("skipping {}: {:#}", path.display(), e);
                skipped.push(SkippedSource {
                    path,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    let mut merged = merge(outputs);
    merged.report.skipped_sources = skipped;
    Ok(merged)
}
