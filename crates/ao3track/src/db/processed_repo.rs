//! The write-once set of ingested message ids.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DatabaseError};

/// Returns `true` if the stable message id was already ingested.
pub fn is_processed(db: &Database, message_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| is_processed_in(conn, message_id))
}

pub(crate) fn is_processed_in(conn: &Connection, message_id: &str) -> Result<bool, DatabaseError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM processed_messages WHERE message_id = ?1",
            params![message_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Records a stable message id. Re-marking an id is a no-op.
pub fn mark_processed(
    db: &Database,
    message_id: &str,
    processed_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| mark_processed_in(conn, message_id, processed_at))
}

pub(crate) fn mark_processed_in(
    conn: &Connection,
    message_id: &str,
    processed_at: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO processed_messages (message_id, processed_at) VALUES (?1, ?2)",
        params![message_id, processed_at],
    )?;
    Ok(())
}

/// Counts processed message ids.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 =
            conn.query_row("SELECT COUNT(*) FROM processed_messages", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Forgets every processed id so the next run re-reads the mailbox.
/// Works and updates are kept. Returns the number of ids removed.
pub fn clear(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let removed = conn.execute("DELETE FROM processed_messages", [])?;
        Ok(removed as u64)
    })
}
