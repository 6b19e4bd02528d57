//! Field extraction from AO3 notification emails.
//!
//! Pulls the work id, title, author, chapter label and word counts out of a
//! normalized body and its subject. Notifications come in several loosely
//! related layouts, so every field is found by an ordered cascade of
//! independent rules with a fixed fallback at the end.

pub mod rules;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

pub use rules::{word_counts, Rule, WordCounts};

/// Title stored when no rule finds one.
pub const UNTITLED_WORK: &str = "(untitled work)";

const WORK_URL_BASE: &str = "https://archiveofourown.org/works/";

static RE_WORK_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/works/([0-9]+)").unwrap());
static RE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:posted|updated)\s+(?:Chapter\s+[0-9]+\s+of\s+)?(.+?)(?:\s+has been|\n?\z)")
        .unwrap()
});
static RE_SUBJECT_AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[AO3\]\s*(\S+)\s+(?:posted|updated)").unwrap());
static RE_BODY_AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bby\s+(\S+)").unwrap());
static RE_CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Chapter\s+([0-9]+)").unwrap());

/// How a message body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Html,
    Plain,
    Unknown,
}

/// Structured data pulled from one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedUpdate {
    /// Decimal AO3 work id.
    pub ao3_id: String,
    pub title: String,
    pub author: Option<String>,
    /// Canonical work URL without chapter or query segments.
    pub url: String,
    pub chapter_label: String,
    pub chapter_word_count: Option<u32>,
    pub work_word_count: Option<u32>,
}

/// Extracts update fields from a message. Returns `None` when the body
/// references no AO3 work.
pub fn extract_update(body: &str, kind: BodyKind, subject: &str) -> Option<ExtractedUpdate> {
    let ao3_id = RE_WORK_ID.captures(body)?.get(1)?.as_str().to_string();
    let url = format!("{}{}", WORK_URL_BASE, ao3_id);

    let (title, author, text) = match kind {
        BodyKind::Html => {
            let document = Html::parse_document(body);
            let text = compact_ws(&text_content(document.root_element()));
            let title = html_link_title(&document, &url).or_else(|| title_from(&text));
            (title, html_author(&document), text)
        }
        BodyKind::Plain | BodyKind::Unknown => {
            let title = title_from(subject).or_else(|| title_from(body));
            (title, plain_author(subject, body), body.to_string())
        }
    };

    let counts = word_counts(&text);

    Some(ExtractedUpdate {
        ao3_id,
        title: title.unwrap_or_else(|| UNTITLED_WORK.to_string()),
        author,
        url,
        chapter_label: chapter_label(subject, &text),
        chapter_word_count: counts.chapter,
        work_word_count: counts.work,
    })
}

/// Text of the first work link that is neither empty nor the bare URL.
fn html_link_title(document: &Html, url: &str) -> Option<String> {
    let anchor_sel = Selector::parse("a[href]").ok()?;
    document.select(&anchor_sel).find_map(|a| {
        let href = a.value().attr("href")?;
        if !RE_WORK_ID.is_match(href) {
            return None;
        }
        let text = compact_ws(&text_content(a));
        (!text.is_empty() && text != url).then_some(text)
    })
}

fn html_author(document: &Html) -> Option<String> {
    let anchor_sel = Selector::parse("a[href]").ok()?;
    document.select(&anchor_sel).find_map(|a| {
        let href = a.value().attr("href")?;
        if !(href.contains("/users/") || href.contains("/pseuds/")) {
            return None;
        }
        let text = compact_ws(&text_content(a));
        (!text.is_empty()).then_some(text)
    })
}

fn plain_author(subject: &str, body: &str) -> Option<String> {
    RE_SUBJECT_AUTHOR
        .captures(subject)
        .or_else(|| RE_BODY_AUTHOR.captures(body))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn title_from(text: &str) -> Option<String> {
    let caps = RE_TITLE.captures(text)?;
    let title = caps.get(1)?.as_str().trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Picks the chapter label: an explicit `Chapter N` in the subject, then in
/// the text, then a subject keyword, then `Update`.
pub fn chapter_label(subject: &str, text: &str) -> String {
    RE_CHAPTER
        .captures(subject)
        .or_else(|| RE_CHAPTER.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|n| format!("Chapter {}", n.as_str()))
        .unwrap_or_else(|| subject_keyword_label(subject).to_string())
}

fn subject_keyword_label(subject: &str) -> &'static str {
    let lower = subject.to_lowercase();
    if lower.contains("has been updated") {
        "Updated"
    } else if lower.contains("posted") {
        if lower.contains("series") {
            "Series Update"
        } else {
            "New Work"
        }
    } else if subject.contains("Analysis") {
        "Analysis"
    } else if subject.contains("Final Bows") {
        "Complete"
    } else {
        "Update"
    }
}

fn text_content(elem: ElementRef<'_>) -> String {
    elem.text().collect::<Vec<_>>().join(" ")
}

fn compact_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
