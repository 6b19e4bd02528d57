//! Scrape path: full work metadata fetched from the work page itself.
//!
//! Fetching is behind [`WorkMetadataFetcher`]; this module owns URL handling,
//! field parsing and the merge into stored works.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::db::{work_repo, Database, DatabaseError};
use crate::merge::{Provenance, WorkMetadata};

const WORK_URL_BASE: &str = "https://archiveofourown.org/works/";

static RE_WORK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/works/([0-9]+)").unwrap());

const DATE_FORMATS: &[&str] = &["%d %b %Y", "%d %B %Y", "%b %d, %Y", "%B %d, %Y", "%Y-%m-%d"];

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Could not extract work ID from URL: {0}")]
    InvalidUrl(String),

    #[error("Work {0} has been deleted")]
    Deleted(String),

    #[error("Work {0} is locked and requires login")]
    Locked(String),

    #[error("Failed to fetch work page: {0}")]
    Fetch(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Fetches metadata for one normalized work URL.
#[async_trait]
pub trait WorkMetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<WorkMetadata>;
}

/// Metadata fields as they appear on a work page, before parsing.
#[derive(Debug, Clone, Default)]
pub struct RawWorkPage {
    pub title: String,
    pub author: String,
    pub fandom: String,
    pub rating: String,
    pub warning: String,
    pub category: String,
    pub pairing: String,
    pub language: String,
    pub chapters: String,
    pub words: String,
    pub published: String,
    pub updated: String,
}

impl RawWorkPage {
    /// Parses the page fields into mergeable metadata for `url`.
    pub fn into_metadata(self, url: &str) -> WorkMetadata {
        let (chapters_current, chapters_max) = parse_chapters(&self.chapters);
        WorkMetadata {
            title: text(self.title),
            author: text(self.author),
            url: normalize_work_url(url).or_else(|| Some(url.to_string())),
            total_word_count: parse_words(&self.words),
            fandoms: text(self.fandom),
            rating: text(self.rating),
            archive_warnings: text(self.warning),
            categories: text(self.category),
            relationships: text(self.pairing),
            characters: None,
            additional_tags: None,
            language: text(self.language),
            chapters_current,
            chapters_max,
            status: infer_status(chapters_current, chapters_max).map(str::to_string),
            published_at: parse_date(&self.published),
            updated_at: parse_date(&self.updated),
            summary_html: None,
        }
    }
}

fn text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Numeric work id from any URL containing `/works/<digits>`.
pub fn extract_work_id(url: &str) -> Option<String> {
    RE_WORK_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Canonical `https://archiveofourown.org/works/<id>` form of a work URL.
pub fn normalize_work_url(url: &str) -> Option<String> {
    extract_work_id(url).map(|id| format!("{WORK_URL_BASE}{id}"))
}

/// Parses `"5/10"`, `"5/?"`, `"5"` into (current, max). `"-1"` and empty
/// input mean unknown.
pub fn parse_chapters(value: &str) -> (Option<u32>, Option<u32>) {
    let cleaned = value.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "-1" {
        return (None, None);
    }

    match cleaned.split_once('/') {
        Some((current, max)) => (
            current.trim().parse().ok(),
            max.trim().parse().ok(),
        ),
        None => (cleaned.parse().ok(), None),
    }
}

/// Parses a word count that may contain thousands separators.
pub fn parse_words(value: &str) -> Option<u32> {
    let cleaned = value.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Normalizes a page date to ISO 8601. Unrecognized input is returned
/// trimmed and unchanged; empty input is `None`.
pub fn parse_date(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.to_rfc3339());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(format!("{}T00:00:00", date.format("%Y-%m-%d")));
        }
    }

    debug!("Unrecognized date format, keeping as-is: {}", value);
    Some(value.to_string())
}

/// `complete` once the current chapter reaches the planned total,
/// `in-progress` otherwise. Unknown without a current chapter.
pub fn infer_status(current: Option<u32>, max: Option<u32>) -> Option<&'static str> {
    match (current, max) {
        (Some(current), Some(max)) if current >= max => Some("complete"),
        (Some(_), _) => Some("in-progress"),
        (None, _) => None,
    }
}

/// One URL that could not be scraped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeFailure {
    pub url: String,
    pub error: String,
}

/// Counters for a [`scrape_and_store_works`] batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeStats {
    /// Non-blank URLs seen, including skipped and failed ones.
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub errors: Vec<ScrapeFailure>,
}

enum Stored {
    Inserted,
    Updated,
    Skipped,
}

/// Scrapes each URL and merges the result into the works table.
///
/// Works already tracked are skipped unless `force` is set. A failure on one
/// URL is recorded in [`ScrapeStats::errors`] and the batch continues.
pub async fn scrape_and_store_works<F>(
    db: &Database,
    fetcher: &F,
    urls: &[String],
    force: bool,
) -> ScrapeStats
where
    F: WorkMetadataFetcher + ?Sized,
{
    let mut stats = ScrapeStats::default();

    for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
        stats.processed += 1;
        match scrape_one(db, fetcher, url, force).await {
            Ok(Stored::Inserted) => stats.inserted += 1,
            Ok(Stored::Updated) => stats.updated += 1,
            Ok(Stored::Skipped) => {}
            Err(e) => {
                warn!("Failed to scrape {}: {}", url, e);
                stats.errors.push(ScrapeFailure {
                    url: url.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Scrape finished: {} processed, {} inserted, {} updated, {} failed",
        stats.processed,
        stats.inserted,
        stats.updated,
        stats.errors.len()
    );
    stats
}

async fn scrape_one<F>(db: &Database, fetcher: &F, url: &str, force: bool) -> Result<Stored>
where
    F: WorkMetadataFetcher + ?Sized,
{
    let ao3_id = extract_work_id(url).ok_or_else(|| ScrapeError::InvalidUrl(url.to_string()))?;
    let normalized = format!("{WORK_URL_BASE}{ao3_id}");

    if !force && work_repo::find_by_ao3_id(db, &ao3_id)?.is_some() {
        debug!("Work {} already tracked, skipping", ao3_id);
        return Ok(Stored::Skipped);
    }

    let metadata = fetcher.fetch(&normalized).await?;
    let now = Utc::now().to_rfc3339();
    let outcome =
        work_repo::upsert_with_metadata(db, &ao3_id, &metadata, Provenance::Scrape, &now)?;

    Ok(if outcome.inserted {
        Stored::Inserted
    } else {
        Stored::Updated
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeFetcher {
        pages: HashMap<String, WorkMetadata>,
        locked: Vec<String>,
        unreachable: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn new(pages: Vec<(&str, WorkMetadata)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(url, m)| (url.to_string(), m))
                    .collect(),
                locked: Vec::new(),
                unreachable: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_locked(mut self, url: &str) -> Self {
            self.locked.push(url.to_string());
            self
        }

        fn with_unreachable(mut self, url: &str) -> Self {
            self.unreachable.push(url.to_string());
            self
        }
    }

    #[async_trait]
    impl WorkMetadataFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<WorkMetadata> {
            self.calls.lock().unwrap().push(url.to_string());
            let ao3_id = extract_work_id(url).unwrap_or_default();
            if self.locked.iter().any(|u| u == url) {
                return Err(ScrapeError::Locked(ao3_id));
            }
            if self.unreachable.iter().any(|u| u == url) {
                return Err(ScrapeError::Fetch(format!("connection reset while fetching {url}")));
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or(ScrapeError::Deleted(ao3_id))
        }
    }

    fn page(title: &str, rating: &str) -> WorkMetadata {
        RawWorkPage {
            title: title.to_string(),
            author: "Jane".to_string(),
            rating: rating.to_string(),
            chapters: "3/10".to_string(),
            words: "12,345".to_string(),
            published: "15 Jan 2024".to_string(),
            ..Default::default()
        }
        .into_metadata("https://archiveofourown.org/works/111")
    }

    #[test]
    fn test_extract_and_normalize_work_url() {
        let url = "http://archiveofourown.org/works/123456/chapters/789?view_adult=true";
        assert_eq!(extract_work_id(url).as_deref(), Some("123456"));
        assert_eq!(
            normalize_work_url(url).as_deref(),
            Some("https://archiveofourown.org/works/123456")
        );
        assert_eq!(normalize_work_url("https://archiveofourown.org/users/jane"), None);
    }

    #[test]
    fn test_parse_chapters() {
        assert_eq!(parse_chapters("5/10"), (Some(5), Some(10)));
        assert_eq!(parse_chapters("5/?"), (Some(5), None));
        assert_eq!(parse_chapters("5"), (Some(5), None));
        assert_eq!(parse_chapters("1,001/1,200"), (Some(1001), Some(1200)));
        assert_eq!(parse_chapters("-1"), (None, None));
        assert_eq!(parse_chapters(""), (None, None));
    }

    #[test]
    fn test_parse_words() {
        assert_eq!(parse_words("12,345"), Some(12345));
        assert_eq!(parse_words(" 800 "), Some(800));
        assert_eq!(parse_words(""), None);
        assert_eq!(parse_words("lots"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-15").as_deref(), Some("2024-01-15T00:00:00"));
        assert_eq!(parse_date("15 Jan 2024").as_deref(), Some("2024-01-15T00:00:00"));
        assert_eq!(parse_date("15 January 2024").as_deref(), Some("2024-01-15T00:00:00"));
        assert_eq!(parse_date("Jan 15, 2024").as_deref(), Some("2024-01-15T00:00:00"));
        assert_eq!(parse_date("January 15, 2024").as_deref(), Some("2024-01-15T00:00:00"));
        assert_eq!(
            parse_date("2024-01-15T10:30:00+00:00").as_deref(),
            Some("2024-01-15T10:30:00+00:00")
        );
        assert_eq!(parse_date("sometime last week").as_deref(), Some("sometime last week"));
        assert_eq!(parse_date("  "), None);
    }

    #[test]
    fn test_infer_status() {
        assert_eq!(infer_status(Some(10), Some(10)), Some("complete"));
        assert_eq!(infer_status(Some(3), Some(10)), Some("in-progress"));
        assert_eq!(infer_status(Some(3), None), Some("in-progress"));
        assert_eq!(infer_status(None, Some(10)), None);
    }

    #[test]
    fn test_raw_page_into_metadata() {
        let metadata = page("My Story", "Teen And Up Audiences");
        assert_eq!(metadata.title.as_deref(), Some("My Story"));
        assert_eq!(metadata.total_word_count, Some(12345));
        assert_eq!(metadata.chapters_current, Some(3));
        assert_eq!(metadata.chapters_max, Some(10));
        assert_eq!(metadata.status.as_deref(), Some("in-progress"));
        assert_eq!(metadata.published_at.as_deref(), Some("2024-01-15T00:00:00"));
        assert_eq!(metadata.fandoms, None);
        assert_eq!(
            metadata.url.as_deref(),
            Some("https://archiveofourown.org/works/111")
        );
    }

    #[tokio::test]
    async fn test_scrape_batch_counts() {
        let db = Database::open_in_memory().unwrap();
        let fetcher = FakeFetcher::new(vec![
            ("https://archiveofourown.org/works/111", page("My Story", "Teen")),
            ("https://archiveofourown.org/works/222", page("Other", "General")),
        ]);
        let urls = vec![
            "https://archiveofourown.org/works/111".to_string(),
            "   ".to_string(),
            "https://archiveofourown.org/works/222/chapters/5".to_string(),
            "https://archiveofourown.org/works/333".to_string(),
            "not a work url".to_string(),
        ];

        let stats = scrape_and_store_works(&db, &fetcher, &urls, false).await;
        assert_eq!(stats.processed, 4);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.errors.len(), 2);
        assert_eq!(stats.errors[0].url, "https://archiveofourown.org/works/333");
        assert!(stats.errors[0].error.contains("deleted"));
        assert!(stats.errors[1].error.contains("Could not extract work ID"));

        let work = work_repo::find_by_ao3_id(&db, "111").unwrap().unwrap();
        assert_eq!(work.title, "My Story");
        assert_eq!(work.metadata_source, Provenance::Scrape);
    }

    #[tokio::test]
    async fn test_existing_works_skipped_unless_forced() {
        let db = Database::open_in_memory().unwrap();
        let fetcher = FakeFetcher::new(vec![(
            "https://archiveofourown.org/works/111",
            page("My Story", "Teen"),
        )]);
        let urls = vec!["https://archiveofourown.org/works/111".to_string()];

        scrape_and_store_works(&db, &fetcher, &urls, false).await;
        let second = scrape_and_store_works(&db, &fetcher, &urls, false).await;
        assert_eq!(second.processed, 1);
        assert_eq!(second.inserted + second.updated, 0);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);

        let forced = scrape_and_store_works(&db, &fetcher, &urls, true).await;
        assert_eq!(forced.updated, 1);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scrape_fills_gaps_without_erasing() {
        let db = Database::open_in_memory().unwrap();
        let existing = WorkMetadata {
            title: Some("My Story".to_string()),
            fandoms: Some("Harry Potter".to_string()),
            ..Default::default()
        };
        work_repo::upsert_with_metadata(&db, "111", &existing, Provenance::Email, "2024-01-01")
            .unwrap();

        let fetcher = FakeFetcher::new(vec![(
            "https://archiveofourown.org/works/111",
            page("Renamed", "Teen"),
        )]);
        let urls = vec!["https://archiveofourown.org/works/111".to_string()];
        let stats = scrape_and_store_works(&db, &fetcher, &urls, true).await;
        assert_eq!(stats.updated, 1);

        let work = work_repo::find_by_ao3_id(&db, "111").unwrap().unwrap();
        assert_eq!(work.title, "My Story");
        assert_eq!(work.fandoms.as_deref(), Some("Harry Potter"));
        assert_eq!(work.rating.as_deref(), Some("Teen"));
        assert_eq!(work.metadata_source, Provenance::Mixed);
    }

    #[tokio::test]
    async fn test_locked_and_unreachable_works_recorded() {
        let db = Database::open_in_memory().unwrap();
        let fetcher = FakeFetcher::new(vec![(
            "https://archiveofourown.org/works/111",
            page("My Story", "Teen"),
        )])
        .with_locked("https://archiveofourown.org/works/444")
        .with_unreachable("https://archiveofourown.org/works/555");
        let urls = vec![
            "https://archiveofourown.org/works/444".to_string(),
            "https://archiveofourown.org/works/555/chapters/2".to_string(),
            "https://archiveofourown.org/works/111".to_string(),
        ];

        let stats = scrape_and_store_works(&db, &fetcher, &urls, false).await;
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.errors.len(), 2);
        assert_eq!(stats.errors[0].url, "https://archiveofourown.org/works/444");
        assert_eq!(stats.errors[0].error, "Work 444 is locked and requires login");
        assert_eq!(
            stats.errors[1].url,
            "https://archiveofourown.org/works/555/chapters/2"
        );
        assert!(stats.errors[1].error.starts_with("Failed to fetch work page:"));

        assert!(work_repo::find_by_ao3_id(&db, "444").unwrap().is_none());
        assert!(work_repo::find_by_ao3_id(&db, "555").unwrap().is_none());
    }
}
