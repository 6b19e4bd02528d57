//! Works: the persisted aggregate keyed by AO3 work id.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::email::extract::{ExtractedUpdate, UNTITLED_WORK};
use crate::merge::{self, Provenance, WorkMetadata};

use super::{processed_repo, update_repo, Database, DatabaseError};

const WORK_COLUMNS: &str = "id, ao3_id, title, author, url, last_seen_chapter, last_update_at,
    total_word_count, fandoms, rating, archive_warnings, categories, relationships, characters,
    additional_tags, language, chapters_current, chapters_max, status, published_at, updated_at,
    summary_html, metadata_source";

/// A work row as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkRow {
    pub id: i64,
    pub ao3_id: String,
    pub title: String,
    pub author: Option<String>,
    pub url: Option<String>,
    pub last_seen_chapter: Option<String>,
    pub last_update_at: Option<String>,
    pub total_word_count: Option<u32>,
    pub fandoms: Option<String>,
    pub rating: Option<String>,
    pub archive_warnings: Option<String>,
    pub categories: Option<String>,
    pub relationships: Option<String>,
    pub characters: Option<String>,
    pub additional_tags: Option<String>,
    pub language: Option<String>,
    pub chapters_current: Option<u32>,
    pub chapters_max: Option<u32>,
    pub status: Option<String>,
    pub published_at: Option<String>,
    pub updated_at: Option<String>,
    pub summary_html: Option<String>,
    pub metadata_source: Provenance,
}

impl WorkRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let source: String = row.get(22)?;
        Ok(Self {
            id: row.get(0)?,
            ao3_id: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            url: row.get(4)?,
            last_seen_chapter: row.get(5)?,
            last_update_at: row.get(6)?,
            total_word_count: row.get(7)?,
            fandoms: row.get(8)?,
            rating: row.get(9)?,
            archive_warnings: row.get(10)?,
            categories: row.get(11)?,
            relationships: row.get(12)?,
            characters: row.get(13)?,
            additional_tags: row.get(14)?,
            language: row.get(15)?,
            chapters_current: row.get(16)?,
            chapters_max: row.get(17)?,
            status: row.get(18)?,
            published_at: row.get(19)?,
            updated_at: row.get(20)?,
            summary_html: row.get(21)?,
            metadata_source: Provenance::parse(&source).unwrap_or(Provenance::Mixed),
        })
    }

    /// The mergeable part of this row.
    pub fn metadata(&self) -> WorkMetadata {
        WorkMetadata {
            title: Some(self.title.clone()).filter(|t| t != UNTITLED_WORK),
            author: self.author.clone(),
            url: self.url.clone(),
            total_word_count: self.total_word_count,
            fandoms: self.fandoms.clone(),
            rating: self.rating.clone(),
            archive_warnings: self.archive_warnings.clone(),
            categories: self.categories.clone(),
            relationships: self.relationships.clone(),
            characters: self.characters.clone(),
            additional_tags: self.additional_tags.clone(),
            language: self.language.clone(),
            chapters_current: self.chapters_current,
            chapters_max: self.chapters_max,
            status: self.status.clone(),
            published_at: self.published_at.clone(),
            updated_at: self.updated_at.clone(),
            summary_html: self.summary_html.clone(),
        }
    }
}

/// The notification an extracted update came from.
#[derive(Debug, Clone, Copy)]
pub struct NotificationRef<'a> {
    /// Stable message id, marked processed in the same transaction.
    pub message_id: &'a str,
    pub subject: &'a str,
    pub date: &'a str,
}

/// Ids written by [`record_email_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedUpdate {
    pub work_id: i64,
    pub update_id: i64,
    /// `true` when the work did not exist before.
    pub created_work: bool,
}

/// Outcome of [`upsert_with_metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub work_id: i64,
    pub inserted: bool,
}

/// Finds a work by its AO3 id.
pub fn find_by_ao3_id(db: &Database, ao3_id: &str) -> Result<Option<WorkRow>, DatabaseError> {
    db.with_conn(|conn| find_by_ao3_id_in(conn, ao3_id))
}

fn find_by_ao3_id_in(conn: &Connection, ao3_id: &str) -> Result<Option<WorkRow>, DatabaseError> {
    let sql = format!("SELECT {} FROM works WHERE ao3_id = ?1", WORK_COLUMNS);
    Ok(conn
        .query_row(&sql, params![ao3_id], WorkRow::from_row)
        .optional()?)
}

/// Finds a work by its row id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<WorkRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!("SELECT {} FROM works WHERE id = ?1", WORK_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], WorkRow::from_row)
            .optional()?)
    })
}

/// Upserts the work named by an extracted notification, appends its update
/// row and marks the message processed, all in one transaction.
///
/// Display fields follow the newest notification: title, url and chapter
/// are replaced, the author only when the notification names one, and the
/// total word count only when the notification carries one. An untitled
/// placeholder never replaces a known title.
pub fn record_email_update(
    db: &Database,
    extracted: &ExtractedUpdate,
    notification: NotificationRef<'_>,
    now: &str,
) -> Result<RecordedUpdate, DatabaseError> {
    db.with_tx(|tx| {
        let existing = find_by_ao3_id_in(tx, &extracted.ao3_id)?;

        let (work_id, created_work) = match existing {
            None => {
                tx.execute(
                    "INSERT INTO works (ao3_id, title, author, url, last_seen_chapter,
                     last_update_at, total_word_count, metadata_source)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        extracted.ao3_id,
                        extracted.title,
                        extracted.author,
                        extracted.url,
                        extracted.chapter_label,
                        now,
                        extracted.work_word_count,
                        Provenance::Email.as_str(),
                    ],
                )?;
                (tx.last_insert_rowid(), true)
            }
            Some(work) => {
                let title = if extracted.title == UNTITLED_WORK {
                    work.title.clone()
                } else {
                    extracted.title.clone()
                };
                let author = extracted.author.clone().or(work.author.clone());
                let total = extracted.work_word_count.or(work.total_word_count);
                let provenance = work.metadata_source.combine(Provenance::Email);

                tx.execute(
                    "UPDATE works SET title = ?1, author = ?2, url = ?3, last_seen_chapter = ?4,
                     last_update_at = ?5, total_word_count = ?6, metadata_source = ?7
                     WHERE id = ?8",
                    params![
                        title,
                        author,
                        extracted.url,
                        extracted.chapter_label,
                        now,
                        total,
                        provenance.as_str(),
                        work.id,
                    ],
                )?;
                (work.id, false)
            }
        };

        let update_id = update_repo::append_in(
            tx,
            &update_repo::NewUpdate {
                work_id,
                chapter_label: extracted.chapter_label.clone(),
                email_subject: Some(notification.subject.to_string()),
                email_date: Some(notification.date.to_string()),
                chapter_word_count: extracted.chapter_word_count,
                work_word_count: extracted.work_word_count,
            },
            now,
        )?;

        processed_repo::mark_processed_in(tx, notification.message_id, now)?;

        Ok(RecordedUpdate {
            work_id,
            update_id,
            created_work,
        })
    })
}

/// Inserts or merges externally sourced metadata (e.g. a scrape) for a work.
///
/// New works take the incoming fields as-is. Existing works are merged with
/// [`merge::merge_work`]; `last_update_at` is always refreshed.
pub fn upsert_with_metadata(
    db: &Database,
    ao3_id: &str,
    incoming: &WorkMetadata,
    source: Provenance,
    now: &str,
) -> Result<UpsertOutcome, DatabaseError> {
    db.with_tx(|tx| match find_by_ao3_id_in(tx, ao3_id)? {
        None => {
            let title = merge::non_blank(&incoming.title).unwrap_or(UNTITLED_WORK);
            let blank = WorkMetadata::default();
            let fields = merge::coalesce(&blank, incoming);
            tx.execute(
                "INSERT INTO works (ao3_id, title, last_update_at, metadata_source)
                 VALUES (?1, ?2, ?3, ?4)",
                params![ao3_id, title, now, source.as_str()],
            )?;
            let work_id = tx.last_insert_rowid();
            write_metadata(tx, work_id, &fields, source, now)?;
            Ok(UpsertOutcome {
                work_id,
                inserted: true,
            })
        }
        Some(work) => {
            let merged =
                merge::merge_work(&work.metadata(), work.metadata_source, incoming, source);
            write_metadata(tx, work.id, &merged.metadata, merged.provenance, now)?;
            Ok(UpsertOutcome {
                work_id: work.id,
                inserted: false,
            })
        }
    })
}

fn write_metadata(
    conn: &Connection,
    work_id: i64,
    m: &WorkMetadata,
    provenance: Provenance,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE works SET
            title = COALESCE(?1, title), author = ?2, url = ?3, total_word_count = ?4,
            fandoms = ?5, rating = ?6, archive_warnings = ?7, categories = ?8,
            relationships = ?9, characters = ?10, additional_tags = ?11, language = ?12,
            chapters_current = ?13, chapters_max = ?14, status = ?15, published_at = ?16,
            updated_at = ?17, summary_html = ?18, metadata_source = ?19, last_update_at = ?20
         WHERE id = ?21",
        params![
            m.title,
            m.author,
            m.url,
            m.total_word_count,
            m.fandoms,
            m.rating,
            m.archive_warnings,
            m.categories,
            m.relationships,
            m.characters,
            m.additional_tags,
            m.language,
            m.chapters_current,
            m.chapters_max,
            m.status,
            m.published_at,
            m.updated_at,
            m.summary_html,
            provenance.as_str(),
            now,
            work_id,
        ],
    )?;
    Ok(())
}

/// Filter and paging for [`list`].
#[derive(Debug, Clone)]
pub struct WorkQuery {
    /// Case-insensitive substring match on title or author.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for WorkQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            page_size: 20,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(page_size as u64) as u32
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// Lists works, most recently updated first.
pub fn list(db: &Database, query: &WorkQuery) -> Result<Page<WorkRow>, DatabaseError> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 100);
    let offset = (page - 1) as i64 * page_size as i64;
    let pattern = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));

    db.with_conn(|conn| {
        let filter = "(?1 IS NULL OR title LIKE ?1 OR author LIKE ?1)";

        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM works WHERE {}", filter),
            params![pattern],
            |r| r.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM works WHERE {}
             ORDER BY last_update_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            WORK_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![pattern, page_size, offset], WorkRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total, page, page_size))
    })
}

/// Counts tracked works.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM works", [], |r| r.get(0))?;
        Ok(count)
    })
}
