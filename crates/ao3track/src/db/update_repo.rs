//! Append-only notification history per work.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::work_repo::Page;
use super::{Database, DatabaseError};

/// Fields for a new update row.
#[derive(Debug, Clone)]
pub struct NewUpdate {
    pub work_id: i64,
    pub chapter_label: String,
    pub email_subject: Option<String>,
    pub email_date: Option<String>,
    pub chapter_word_count: Option<u32>,
    pub work_word_count: Option<u32>,
}

/// A stored update row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRow {
    pub id: i64,
    pub work_id: i64,
    pub chapter_label: String,
    pub email_subject: Option<String>,
    pub email_date: Option<String>,
    pub chapter_word_count: Option<u32>,
    pub work_word_count: Option<u32>,
    pub is_read: bool,
    pub created_at: String,
}

impl UpdateRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            work_id: row.get(1)?,
            chapter_label: row.get(2)?,
            email_subject: row.get(3)?,
            email_date: row.get(4)?,
            chapter_word_count: row.get(5)?,
            work_word_count: row.get(6)?,
            is_read: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

/// An update joined with the display fields of its work.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWithWork {
    #[serde(flatten)]
    pub update: UpdateRow,
    pub ao3_id: String,
    pub work_title: String,
    pub work_author: Option<String>,
    pub work_url: Option<String>,
}

const UPDATE_COLUMNS: &str = "u.id, u.work_id, u.chapter_label, u.email_subject, u.email_date,
    u.chapter_word_count, u.work_word_count, u.is_read, u.created_at";

/// Appends an update row. Returns its id.
pub fn append(db: &Database, update: &NewUpdate, created_at: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| append_in(conn, update, created_at))
}

pub(crate) fn append_in(
    conn: &Connection,
    update: &NewUpdate,
    created_at: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO updates (work_id, chapter_label, email_subject, email_date,
         chapter_word_count, work_word_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            update.work_id,
            update.chapter_label,
            update.email_subject,
            update.email_date,
            update.chapter_word_count,
            update.work_word_count,
            created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Lists the updates of one work in email-date order (oldest first).
pub fn list_for_work(db: &Database, work_id: i64) -> Result<Vec<UpdateRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT {} FROM updates u WHERE u.work_id = ?1
             ORDER BY u.email_date ASC, u.id ASC",
            UPDATE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![work_id], UpdateRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists updates across all works, newest first.
pub fn list_recent(
    db: &Database,
    unread_only: bool,
    page: u32,
    page_size: u32,
) -> Result<Page<UpdateWithWork>, DatabaseError> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, 100);
    let offset = (page - 1) as i64 * page_size as i64;

    db.with_conn(|conn| {
        let total: u64 = conn.query_row(
            "SELECT COUNT(*) FROM updates WHERE (?1 = 0 OR is_read = 0)",
            params![unread_only],
            |r| r.get(0),
        )?;

        let sql = format!(
            "SELECT {}, w.ao3_id, w.title, w.author, w.url
             FROM updates u JOIN works w ON w.id = u.work_id
             WHERE (?1 = 0 OR u.is_read = 0)
             ORDER BY u.email_date DESC, u.id DESC LIMIT ?2 OFFSET ?3",
            UPDATE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![unread_only, page_size, offset], |row| {
                Ok(UpdateWithWork {
                    update: UpdateRow::from_row(row)?,
                    ao3_id: row.get(9)?,
                    work_title: row.get(10)?,
                    work_author: row.get(11)?,
                    work_url: row.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total, page, page_size))
    })
}

/// Marks every update of a work as read. Returns the number of rows changed.
pub fn mark_work_read(db: &Database, work_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM works WHERE id = ?1)",
            params![work_id],
            |r| r.get(0),
        )?;
        if !exists {
            return Err(DatabaseError::NotFound {
                entity: "work",
                id: work_id.to_string(),
            });
        }
        let changed = conn.execute(
            "UPDATE updates SET is_read = 1 WHERE work_id = ?1 AND is_read = 0",
            params![work_id],
        )?;
        Ok(changed as u64)
    })
}

/// Counts unread updates for a work.
pub fn count_unread(db: &Database, work_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM updates WHERE work_id = ?1 AND is_read = 0",
            params![work_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db_with_work() -> (Database, i64) {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let work_id = db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO works (ao3_id, title) VALUES ('42', 'Answer')",
                    [],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .unwrap();
        (db, work_id)
    }

    fn new_update(work_id: i64, label: &str, date: &str) -> NewUpdate {
        NewUpdate {
            work_id,
            chapter_label: label.to_string(),
            email_subject: Some(format!("[AO3] {}", label)),
            email_date: Some(date.to_string()),
            chapter_word_count: Some(500),
            work_word_count: None,
        }
    }

    #[test]
    fn test_append_and_list_for_work() {
        let (db, work_id) = test_db_with_work();
        append(&db, &new_update(work_id, "Chapter 2", "2026-01-02"), "c").unwrap();
        append(&db, &new_update(work_id, "Chapter 1", "2026-01-01"), "c").unwrap();

        let rows = list_for_work(&db, work_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chapter_label, "Chapter 1");
        assert!(!rows[0].is_read);
    }

    #[test]
    fn test_append_requires_existing_work() {
        let (db, _) = test_db_with_work();
        assert!(append(&db, &new_update(999, "Chapter 1", "2026-01-01"), "c").is_err());
    }

    #[test]
    fn test_mark_work_read() {
        let (db, work_id) = test_db_with_work();
        append(&db, &new_update(work_id, "Chapter 1", "2026-01-01"), "c").unwrap();
        append(&db, &new_update(work_id, "Chapter 2", "2026-01-02"), "c").unwrap();
        assert_eq!(count_unread(&db, work_id).unwrap(), 2);

        assert_eq!(mark_work_read(&db, work_id).unwrap(), 2);
        assert_eq!(count_unread(&db, work_id).unwrap(), 0);
        assert_eq!(mark_work_read(&db, work_id).unwrap(), 0);
    }

    #[test]
    fn test_mark_missing_work_read() {
        let (db, _) = test_db_with_work();
        assert!(matches!(
            mark_work_read(&db, 12345),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_recent_unread_only() {
        let (db, work_id) = test_db_with_work();
        append(&db, &new_update(work_id, "Chapter 1", "2026-01-01"), "c").unwrap();
        mark_work_read(&db, work_id).unwrap();
        append(&db, &new_update(work_id, "Chapter 2", "2026-01-02"), "c").unwrap();

        let all = list_recent(&db, false, 1, 20).unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].update.chapter_label, "Chapter 2");
        assert_eq!(all.items[0].work_title, "Answer");

        let unread = list_recent(&db, true, 1, 20).unwrap();
        assert_eq!(unread.total, 1);
        assert_eq!(unread.items.len(), 1);
    }
}
