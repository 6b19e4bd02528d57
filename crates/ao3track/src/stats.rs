//! Per-work statistics derived from the update history.

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

use crate::db::update_repo::{self, UpdateRow};
use crate::db::work_repo::{self, WorkRow};
use crate::db::{Database, DatabaseError};

/// One point of the work word-count series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCountPoint {
    pub date: String,
    pub word_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkStatistics {
    pub total_updates: usize,
    pub average_words_per_chapter: Option<f64>,
    pub total_word_count: Option<u32>,
    pub average_days_between_updates: Option<f64>,
    pub next_expected_release: Option<String>,
    pub word_count_data: Vec<WordCountPoint>,
}

impl WorkStatistics {
    /// Computes statistics from updates ordered oldest first.
    pub fn compute(updates: &[UpdateRow], work: &WorkRow) -> Self {
        let word_count_data = updates
            .iter()
            .filter_map(|u| {
                let date = u.email_date.as_deref().filter(|d| !d.is_empty())?;
                Some(WordCountPoint {
                    date: date.to_string(),
                    word_count: u.work_word_count?,
                })
            })
            .collect();

        let chapter_words: Vec<u32> = updates.iter().filter_map(|u| u.chapter_word_count).collect();
        let average_words_per_chapter = (!chapter_words.is_empty()).then(|| {
            chapter_words.iter().map(|&w| f64::from(w)).sum::<f64>() / chapter_words.len() as f64
        });

        let mut gaps = Vec::new();
        let mut last_gap_end = None;
        for pair in updates.windows(2) {
            let (Some(earlier), Some(later)) = (
                pair[0].email_date.as_deref().and_then(parse_email_date),
                pair[1].email_date.as_deref().and_then(parse_email_date),
            ) else {
                continue;
            };
            let days = (later - earlier).num_days();
            if days > 0 {
                gaps.push(days);
                last_gap_end = Some(later);
            }
        }

        let (average_days_between_updates, next_expected_release) = match last_gap_end {
            Some(end) => {
                let average = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
                let offset = Duration::seconds((average * 86_400.0).round() as i64);
                (
                    Some((average * 10.0).round() / 10.0),
                    Some((end + offset).to_rfc3339()),
                )
            }
            None => (None, None),
        };

        Self {
            total_updates: updates.len(),
            average_words_per_chapter,
            total_word_count: work.total_word_count,
            average_days_between_updates,
            next_expected_release,
            word_count_data,
        }
    }

    /// Loads the work and its updates and computes statistics. `None` when
    /// the work is not tracked.
    pub fn for_work(db: &Database, ao3_id: &str) -> Result<Option<Self>, DatabaseError> {
        let Some(work) = work_repo::find_by_ao3_id(db, ao3_id)? else {
            return Ok(None);
        };
        let updates = update_repo::list_for_work(db, work.id)?;
        Ok(Some(Self::compute(&updates, &work)))
    }
}

/// Parses a stored email date (RFC 3339, or RFC 2822 as sent).
fn parse_email_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .ok()
}
