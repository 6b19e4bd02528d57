//! One row per ingestion run.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{Database, DatabaseError};

/// Final counters of a run, written on completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCompletion {
    pub messages_processed: u32,
    pub messages_skipped: u32,
    pub messages_ignored: u32,
    pub fetch_failures: u32,
    pub error_message: Option<String>,
}

/// A stored run record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionLogRow {
    pub id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub messages_processed: u32,
    pub messages_skipped: u32,
    pub messages_ignored: u32,
    pub fetch_failures: u32,
    pub error_message: Option<String>,
}

impl IngestionLogRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            started_at: row.get(1)?,
            completed_at: row.get(2)?,
            messages_processed: row.get(3)?,
            messages_skipped: row.get(4)?,
            messages_ignored: row.get(5)?,
            fetch_failures: row.get(6)?,
            error_message: row.get(7)?,
        })
    }
}

/// Records the start of a run. Returns the log id.
pub fn log_start(db: &Database, started_at: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO ingestion_log (started_at) VALUES (?1)",
            params![started_at],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Records the end of a run.
pub fn log_complete(
    db: &Database,
    log_id: i64,
    completed_at: &str,
    completion: &RunCompletion,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE ingestion_log SET completed_at = ?1, messages_processed = ?2,
             messages_skipped = ?3, messages_ignored = ?4, fetch_failures = ?5,
             error_message = ?6
             WHERE id = ?7",
            params![
                completed_at,
                completion.messages_processed,
                completion.messages_skipped,
                completion.messages_ignored,
                completion.fetch_failures,
                completion.error_message,
                log_id,
            ],
        )?;
        Ok(())
    })
}

/// Most recent runs first.
pub fn list_recent(db: &Database, limit: u32) -> Result<Vec<IngestionLogRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, started_at, completed_at, messages_processed, messages_skipped,
             messages_ignored, fetch_failures, error_message
             FROM ingestion_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], IngestionLogRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
