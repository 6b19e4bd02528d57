//! Metadata merge policy shared by the email and scrape paths.
//!
//! Incoming fields only fill gaps; a later, sparser source never erases
//! what an earlier one recorded. Provenance is the exception and always
//! reflects every source that has contributed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which acquisition path populated a work's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Email,
    Scrape,
    Mixed,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Email => "email",
            Provenance::Scrape => "scrape",
            Provenance::Mixed => "mixed",
        }
    }

    /// Parses a stored tag. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "email" => Some(Provenance::Email),
            "scrape" => Some(Provenance::Scrape),
            "mixed" => Some(Provenance::Mixed),
            _ => None,
        }
    }

    /// Tag after a merge from `incoming`. Order-independent: any two
    /// distinct sources end up `Mixed`.
    pub fn combine(self, incoming: Provenance) -> Provenance {
        if self == incoming {
            self
        } else {
            Provenance::Mixed
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mergeable field set of a work. Every field is optional; `None`
/// (or an empty string) means "this source does not know".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
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
}

/// Result of merging incoming metadata into an existing work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub metadata: WorkMetadata,
    pub provenance: Provenance,
}

/// Merges `incoming` into `existing` with fill-if-absent semantics and
/// combines the provenance tags.
pub fn merge_work(
    existing: &WorkMetadata,
    existing_source: Provenance,
    incoming: &WorkMetadata,
    incoming_source: Provenance,
) -> Merged {
    Merged {
        metadata: coalesce(existing, incoming),
        provenance: existing_source.combine(incoming_source),
    }
}

/// Field-wise coalesce: keep the existing value when present, else take
/// the incoming one.
pub fn coalesce(existing: &WorkMetadata, incoming: &WorkMetadata) -> WorkMetadata {
    WorkMetadata {
        title: fill_text(&existing.title, &incoming.title),
        author: fill_text(&existing.author, &incoming.author),
        url: fill_text(&existing.url, &incoming.url),
        total_word_count: existing.total_word_count.or(incoming.total_word_count),
        fandoms: fill_text(&existing.fandoms, &incoming.fandoms),
        rating: fill_text(&existing.rating, &incoming.rating),
        archive_warnings: fill_text(&existing.archive_warnings, &incoming.archive_warnings),
        categories: fill_text(&existing.categories, &incoming.categories),
        relationships: fill_text(&existing.relationships, &incoming.relationships),
        characters: fill_text(&existing.characters, &incoming.characters),
        additional_tags: fill_text(&existing.additional_tags, &incoming.additional_tags),
        language: fill_text(&existing.language, &incoming.language),
        chapters_current: existing.chapters_current.or(incoming.chapters_current),
        chapters_max: existing.chapters_max.or(incoming.chapters_max),
        status: fill_text(&existing.status, &incoming.status),
        published_at: fill_text(&existing.published_at, &incoming.published_at),
        updated_at: fill_text(&existing.updated_at, &incoming.updated_at),
        summary_html: fill_text(&existing.summary_html, &incoming.summary_html),
    }
}

/// Returns the value only if it carries non-blank text.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn fill_text(existing: &Option<String>, incoming: &Option<String>) -> Option<String> {
    non_blank(existing)
        .or_else(|| non_blank(incoming))
        .map(str::to_string)
}
