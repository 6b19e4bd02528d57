//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order. Column additions are handled conditionally
//! so that databases created by older builds upgrade in place.

use log::{debug, info};
use rusqlite::{params, Connection};

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    /// Execute the SQL directly.
    Standard,
    /// ALTER TABLE ADD COLUMN, skipped when the column is already there.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_works_table",
        sql: include_str!("sql/001_create_works.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create_updates_table",
        sql: include_str!("sql/002_create_updates.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "create_processed_messages_table",
        sql: include_str!("sql/003_create_processed_messages.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 4,
        description: "create_ingestion_log_table",
        sql: include_str!("sql/004_create_ingestion_log.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 5,
        description: "add_is_read_to_updates",
        sql: include_str!("sql/005_add_is_read_to_updates.sql"),
        kind: MigrationKind::AddColumn {
            table: "updates",
            column: "is_read",
        },
    },
];

/// Tables owned by the migrations, in drop order (children first).
pub(crate) const MANAGED_TABLES: &[&str] = &[
    "updates",
    "works",
    "processed_messages",
    "ingestion_log",
    "_migrations",
];

/// Applies every migration newer than the recorded schema version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied = schema_version(conn)?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > applied);

    for migration in pending {
        apply(conn, migration)?;
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |r| {
        r.get(0)
    })?;
    Ok(version)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let needed = match migration.kind {
        MigrationKind::Standard => true,
        MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
    };

    if needed {
        info!("Applying schema v{} ({})", migration.version, migration.description);
        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;
    } else {
        debug!("Schema v{} already satisfied, recording only", migration.version);
    }

    conn.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        params![migration.version, migration.description],
    )?;
    Ok(())
}

/// Drops every managed table. Callers re-run [`run_all`] afterwards.
pub(crate) fn drop_all(conn: &Connection) -> Result<(), DatabaseError> {
    for table in MANAGED_TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
    }
    Ok(())
}

/// `true` if `table` already has `column`. Table names are interpolated,
/// so anything but `[A-Za-z0-9_]` is rejected.
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let valid = !table.is_empty() && table.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if !valid {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("refusing to inspect table '{}'", table),
        });
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut names = stmt.query_map([], |row| row.get::<_, String>("name"))?;
    Ok(names.any(|name| matches!(name, Ok(n) if n == column)))
}
