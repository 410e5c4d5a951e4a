use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::{fs, path::Path};
use tracing::{debug, warn};

use crate::{process::utils::clean_str, record::RawRow};

/// A source file as read from disk, before any schema reconciliation.
#[derive(Debug)]
pub struct RawTable {
    /// Column names in header order, as the file spells them.
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Lines skipped because their field count did not match the header.
    pub malformed_lines: usize,
}

/// `;` when the first line has more semicolons than commas, else `,`.
pub fn detect_delimiter(first_line: &str) -> u8 {
    let semis = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    if semis > commas {
        b';'
    } else {
        b','
    }
}

/// Read one delimited UTF-8 file. Malformed lines are skipped; a file that
/// is unreadable, not UTF-8, or has no header fails as a whole.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_source<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
    parse_table(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Parse already-decoded CSV text; see [`load_source`].
pub fn parse_table(text: &str) -> Result<RawTable> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_line = text.lines().next().unwrap_or_default();
    let delimiter = detect_delimiter(first_line);
    debug!(delimiter = %(delimiter as char), "detected delimiter");

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .context("reading header line")?
        .iter()
        .map(clean_str)
        .collect();
    if headers.iter().all(String::is_empty) {
        bail!("missing header line");
    }

    let mut rows = Vec::new();
    let mut malformed_lines = 0usize;
    for (idx, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(record = idx, error = %e, "skipping unreadable line");
                malformed_lines += 1;
                continue;
            }
        };
        if record.len() != headers.len() {
            debug!(
                record = idx,
                expected = headers.len(),
                found = record.len(),
                "skipping malformed line"
            );
            malformed_lines += 1;
            continue;
        }
        rows.push(RawRow::from_pairs(
            headers.iter().cloned().zip(record.iter().map(str::to_string)),
        ));
    }

    if malformed_lines > 0 {
        warn!(malformed_lines, kept = rows.len(), "skipped malformed lines");
    }

    Ok(RawTable {
        headers,
        rows,
        malformed_lines,
    })
}
