use anyhow::{Context, Result};
use duckdb::{params, Connection};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::record::CanonicalRecord;

/// Assigns the opaque storage id of each record at write time.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Why a batch was not persisted. Every variant means the whole batch was
/// rolled back.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record {row} rejected: {reason}")]
    Rejected { row: usize, reason: String },
    #[error("inserting record {row} failed: {source}")]
    Insert {
        row: usize,
        #[source]
        source: duckdb::Error,
    },
    #[error("transaction failed: {0}")]
    Transaction(#[from] duckdb::Error),
}

/// Destination for canonical records, written one all-or-nothing batch at a
/// time. `&mut self` keeps a single writer per batch.
pub trait RecordSink {
    /// Persist `batch` atomically, returning the number of rows written.
    fn write_batch(&mut self, batch: &[CanonicalRecord]) -> Result<usize, SinkError>;
}

/// DuckDB-backed accident table.
pub struct DuckSink<G: IdGenerator = RandomIds> {
    conn: Connection,
    table: String,
    ids: G,
}

/// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
pub fn open_disk_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    Connection::open(path).with_context(|| format!("opening DuckDB at {}", path.display()))
}

/// Open a DuckDB in‐memory database
pub fn open_mem_db() -> Result<Connection> {
    Connection::open_in_memory().context("opening in-memory DuckDB")
}

impl DuckSink<RandomIds> {
    pub fn new(conn: Connection, table: &str) -> Result<Self> {
        Self::with_ids(conn, table, RandomIds)
    }
}

impl<G: IdGenerator> DuckSink<G> {
    /// Wrap `conn`, creating the accident table when it is missing.
    pub fn with_ids(conn: Connection, table: &str, ids: G) -> Result<Self> {
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!("invalid table name `{}`", table);
        }
        let sink = Self {
            conn,
            table: table.to_string(),
            ids,
        };
        sink.ensure_table()?;
        Ok(sink)
    }

    fn ensure_table(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {}(
                    id VARCHAR PRIMARY KEY,
                    concessionaire VARCHAR,
                    highway VARCHAR,
                    km DOUBLE NOT NULL CHECK (km >= 0),
                    direction VARCHAR,
                    accident_class VARCHAR,
                    accident_type VARCHAR,
                    cause VARCHAR,
                    weather VARCHAR,
                    visibility VARCHAR,
                    vehicle VARCHAR,
                    lane_type VARCHAR,
                    latitude DOUBLE,
                    longitude DOUBLE,
                    occurred_at TIMESTAMP NOT NULL,
                    fatalities BIGINT NOT NULL CHECK (fatalities >= 0)
                );",
                self.table
            ))
            .with_context(|| format!("creating table {}", self.table))
    }

    /// Rows currently stored.
    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {};", self.table), [], |r| {
                r.get(0)
            })
            .with_context(|| format!("counting rows in {}", self.table))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Storage rules checked before the database sees the row.
fn check_storable(record: &CanonicalRecord) -> Option<String> {
    if !record.km.is_finite() || record.km < 0.0 {
        return Some(format!("km must be a non-negative number, got {}", record.km));
    }
    if record.fatalities < 0 {
        return Some(format!(
            "fatalities must be non-negative, got {}",
            record.fatalities
        ));
    }
    None
}

impl<G: IdGenerator> RecordSink for DuckSink<G> {
    fn write_batch(&mut self, batch: &[CanonicalRecord]) -> Result<usize, SinkError> {
        let sql = format!(
            "INSERT INTO {} (id, concessionaire, highway, km, direction, accident_class, \
             accident_type, cause, weather, visibility, vehicle, lane_type, latitude, \
             longitude, occurred_at, fatalities) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.table
        );

        // Dropping `tx` without commit rolls the batch back.
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for (row, rec) in batch.iter().enumerate() {
                if let Some(reason) = check_storable(rec) {
                    return Err(SinkError::Rejected { row, reason });
                }
                let id = self.ids.next_id();
                stmt.execute(params![
                    id,
                    rec.concessionaire,
                    rec.highway,
                    rec.km,
                    rec.direction,
                    rec.accident_class,
                    rec.accident_type,
                    rec.cause,
                    rec.weather,
                    rec.visibility,
                    rec.vehicle,
                    rec.lane_type,
                    rec.latitude,
                    rec.longitude,
                    rec.occurred_at,
                    rec.fatalities,
                ])
                .map_err(|source| SinkError::Insert { row, source })?;
            }
        }
        tx.commit()?;
        Ok(batch.len())
    }
}

/// A batch that was rolled back.
#[derive(Debug)]
pub struct BatchFailure {
    pub batch: usize,
    pub rows: usize,
    pub error: SinkError,
}

/// Outcome of writing a whole record stream.
#[derive(Debug, Default)]
pub struct SinkReport {
    pub batches_written: usize,
    pub rows_written: usize,
    pub failures: Vec<BatchFailure>,
}

impl SinkReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Feed `records` to `sink` in batches of `batch_size`. A failed batch is
/// reported and the remaining batches are still attempted.
pub fn write_all<S: RecordSink>(
    sink: &mut S,
    records: &[CanonicalRecord],
    batch_size: usize,
) -> SinkReport {
    let start = Instant::now();
    let mut report = SinkReport::default();

    for (batch, chunk) in records.chunks(batch_size.max(1)).enumerate() {
        match sink.write_batch(chunk) {
            Ok(n) => {
                debug!(batch, rows = n, "batch committed");
                report.batches_written += 1;
                report.rows_written += n;
            }
            Err(err) => {
                error!(batch, rows = chunk.len(), error = %err, "batch rolled back");
                report.failures.push(BatchFailure {
                    batch,
                    rows: chunk.len(),
                    error: err,
                });
            }
        }
    }

    info!(
        batches = report.batches_written,
        rows = report.rows_written,
        failed_batches = report.failures.len(),
        elapsed = ?start.elapsed(),
        "sink finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(i: usize) -> CanonicalRecord {
        CanonicalRecord {
            concessionaire: Some("ViaOeste".into()),
            highway: Some("SP 280".into()),
            km: 10.0 + i as f64,
            direction: Some("Norte".into()),
            accident_class: None,
            accident_type: Some("Colisão traseira".into()),
            cause: Some("Falta de atenção".into()),
            weather: None,
            visibility: None,
            vehicle: Some("Automóvel".into()),
            lane_type: None,
            latitude: Some(-23.5),
            longitude: None,
            occurred_at: NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            fatalities: (i % 2) as i64,
        }
    }

    fn records(n: usize) -> Vec<CanonicalRecord> {
        (0..n).map(record).collect()
    }

    /// Hands out `id-1`, `id-2`, ... but repeats the previous id at call `dup_at`.
    struct RepeatingIds {
        n: usize,
        dup_at: usize,
    }

    impl IdGenerator for RepeatingIds {
        fn next_id(&mut self) -> String {
            self.n += 1;
            if self.n == self.dup_at {
                format!("id-{}", self.n - 1)
            } else {
                format!("id-{}", self.n)
            }
        }
    }

    #[test]
    fn batch_is_committed_with_fresh_ids() -> Result<()> {
        let mut sink = DuckSink::new(open_mem_db()?, "accidents")?;
        assert_eq!(sink.write_batch(&records(10))?, 10);
        assert_eq!(sink.count()?, 10);

        let distinct: i64 = sink.connection().query_row(
            "SELECT COUNT(DISTINCT id) FROM accidents;",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(distinct, 10);

        let (ts, lon, cause): (String, Option<f64>, Option<String>) =
            sink.connection().query_row(
                "SELECT CAST(occurred_at AS VARCHAR), longitude, cause FROM accidents LIMIT 1;",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )?;
        assert_eq!(ts, "2024-01-05 14:30:00");
        assert_eq!(lon, None);
        assert_eq!(cause.as_deref(), Some("Falta de atenção"));
        Ok(())
    }

    #[test]
    fn rejected_record_rolls_back_whole_batch() -> Result<()> {
        let mut sink = DuckSink::new(open_mem_db()?, "accidents")?;
        let mut batch = records(10);
        batch[4].km = -1.0;

        match sink.write_batch(&batch) {
            Err(SinkError::Rejected { row, .. }) => assert_eq!(row, 4),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(sink.count()?, 0);
        Ok(())
    }

    #[test]
    fn database_failure_rolls_back_whole_batch() -> Result<()> {
        let ids = RepeatingIds { n: 0, dup_at: 6 };
        let mut sink = DuckSink::with_ids(open_mem_db()?, "accidents", ids)?;

        match sink.write_batch(&records(10)) {
            Err(SinkError::Insert { row, .. }) => assert_eq!(row, 5),
            other => panic!("expected insert failure, got {:?}", other),
        }
        assert_eq!(sink.count()?, 0);
        Ok(())
    }

    #[test]
    fn write_all_reports_failed_batch_and_continues() -> Result<()> {
        let mut sink = DuckSink::new(open_mem_db()?, "accidents")?;
        let mut all = records(7);
        all[4].fatalities = -2;

        let report = write_all(&mut sink, &all, 3);
        assert!(!report.is_success());
        assert_eq!(report.batches_written, 2);
        assert_eq!(report.rows_written, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].batch, 1);
        assert_eq!(report.failures[0].rows, 3);
        assert_eq!(sink.count()?, 4);
        Ok(())
    }

    #[test]
    fn table_name_is_validated() -> Result<()> {
        assert!(DuckSink::new(open_mem_db()?, "acc; DROP TABLE x").is_err());
        Ok(())
    }

    #[test]
    fn reopening_keeps_existing_rows() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("accidents.duckdb");
        {
            let mut sink = DuckSink::new(open_disk_db(&path)?, "accidents")?;
            sink.write_batch(&records(3))?;
        }
        let sink = DuckSink::new(open_disk_db(&path)?, "accidents")?;
        assert_eq!(sink.count()?, 3);
        Ok(())
    }
}
