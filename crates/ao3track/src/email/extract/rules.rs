//! Ordered word-count rules.
//!
//! Each table is evaluated first-match-wins. A rule that matches but yields
//! an unparseable number counts as "not found" and the next rule is tried.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

/// A single named extraction pattern. Group 1 carries the number.
pub struct Rule {
    pub name: &'static str,
    pub pattern: Regex,
}

impl Rule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(&format!("(?i){}", pattern)).unwrap(),
        }
    }

    /// Returns the count captured by the first match, if it parses.
    pub fn find_count(&self, text: &str) -> Option<u32> {
        let caps = self.pattern.captures(text)?;
        parse_count(caps.get(1)?.as_str())
    }
}

/// Work totals announced in the opening line, e.g.
/// `posted Chapter 5 of Title ( 12,345 words):`.
pub static TOP_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            "posted_chapter_parenthesized",
            r"posted\s+(?:a\s+new\s+chapter\s+of|Chapter\s+[0-9]+\s+of)\s+[^(]*\(\s*([0-9,]+)\s+words?\)",
        ),
        Rule::new(
            "posted_work_parenthesized",
            r"posted\s+[^(]*\(\s*([0-9,]+)\s+words?\)",
        ),
        Rule::new(
            "posted_chapter_colon",
            r"posted\s+(?:a\s+new\s+chapter\s+of|Chapter\s+[0-9]+\s+of)\s+[^:]*:\s*([0-9,]+)\s+words?",
        ),
    ]
});

pub static CHAPTER_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            "chapter_heading",
            r"Chapter\s+[0-9]+\s*[\(:]?\s*([0-9,]+)\s+words?",
        ),
        Rule::new("in_this_chapter", r"([0-9,]+)\s+words?\s+in\s+this\s+chapter"),
        Rule::new("words_chapter_suffix", r"([0-9,]+)\s+words?\s+\(chapter"),
    ]
});

pub static WORK_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new("total_prefix", r"total[:\s]+([0-9,]+)\s+words?"),
        Rule::new("work_total_prefix", r"work\s+total[:\s]+([0-9,]+)\s+words?"),
        Rule::new("words_total_suffix", r"([0-9,]+)\s+words?\s+total"),
        Rule::new("words_work_suffix", r"([0-9,]+)\s+words?\s+\(work"),
    ]
});

static RE_ANY_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([0-9,]+)\s+words?").unwrap());

/// Only the top of the message is searched for the opening-line total.
const TOP_WINDOW_CHARS: usize = 500;

/// A lone unlabelled count above this is assumed to be a work total.
pub const WORK_TOTAL_THRESHOLD: u32 = 10_000;

/// Chapter and work word counts found in a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordCounts {
    pub chapter: Option<u32>,
    pub work: Option<u32>,
}

/// Strips thousands separators and parses. Overflow and empty input yield `None`.
pub fn parse_count(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    if digits.is_empty() {
        return None;
    }
    digits.trim().parse::<u32>().ok()
}

/// Evaluates `rules` in order and returns the first parsed count.
pub fn first_count(rules: &[Rule], text: &str) -> Option<u32> {
    rules.iter().find_map(|rule| {
        let count = rule.find_count(text)?;
        debug!("Word-count rule '{}' matched: {}", rule.name, count);
        Some(count)
    })
}

fn top_window(text: &str) -> &str {
    match text.char_indices().nth(TOP_WINDOW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Runs the full word-count cascade over a message's text.
pub fn word_counts(text: &str) -> WordCounts {
    let mut counts = WordCounts {
        chapter: None,
        work: first_count(&TOP_RULES, top_window(text)),
    };

    counts.chapter = first_count(&CHAPTER_RULES, text);

    if counts.work.is_none() {
        counts.work = first_count(&WORK_RULES, text);
    }

    if counts.chapter.is_none() && counts.work.is_none() {
        counts = unlabelled_counts(text);
    }

    counts
}

/// Heuristic for bodies with no labelled counts: with several figures the
/// smallest is the chapter and the largest the work; a single figure is
/// classified by [`WORK_TOTAL_THRESHOLD`].
fn unlabelled_counts(text: &str) -> WordCounts {
    let mut found: Vec<u32> = RE_ANY_WORDS
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).and_then(|m| parse_count(m.as_str())))
        .collect();
    found.sort_unstable();

    match found.as_slice() {
        [] => WordCounts::default(),
        [only] if *only > WORK_TOTAL_THRESHOLD => WordCounts {
            chapter: None,
            work: Some(*only),
        },
        [only] => WordCounts {
            chapter: Some(*only),
            work: None,
        },
        [smallest, .., largest] => WordCounts {
            chapter: Some(*smallest),
            work: Some(*largest),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule<'a>(rules: &'a [Rule], name: &str) -> &'a Rule {
        rules.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12,345"), Some(12_345));
        assert_eq!(parse_count("800"), Some(800));
        assert_eq!(parse_count(","), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("99999999999"), None);
    }

    #[test]
    fn test_top_rules_individually() {
        assert_eq!(
            rule(&TOP_RULES, "posted_chapter_parenthesized")
                .find_count("jane posted Chapter 3 of Story ( 4,200 words)"),
            Some(4_200)
        );
        assert_eq!(
            rule(&TOP_RULES, "posted_chapter_parenthesized")
                .find_count("jane posted a new chapter of Story (900 words)"),
            Some(900)
        );
        assert_eq!(
            rule(&TOP_RULES, "posted_work_parenthesized")
                .find_count("jane posted Story (15,000 words)"),
            Some(15_000)
        );
        assert_eq!(
            rule(&TOP_RULES, "posted_chapter_colon")
                .find_count("jane posted Chapter 2 of Story: 3,000 words"),
            Some(3_000)
        );
    }

    #[test]
    fn test_chapter_rules_individually() {
        assert_eq!(
            rule(&CHAPTER_RULES, "chapter_heading").find_count("Chapter 5 (678 words)"),
            Some(678)
        );
        assert_eq!(
            rule(&CHAPTER_RULES, "chapter_heading").find_count("Chapter 5: 1,234 words"),
            Some(1_234)
        );
        assert_eq!(
            rule(&CHAPTER_RULES, "in_this_chapter").find_count("2,000 words in this chapter"),
            Some(2_000)
        );
        assert_eq!(
            rule(&CHAPTER_RULES, "words_chapter_suffix").find_count("1,500 words (chapter 4)"),
            Some(1_500)
        );
    }

    #[test]
    fn test_work_rules_individually() {
        assert_eq!(
            rule(&WORK_RULES, "total_prefix").find_count("Total: 50,000 words"),
            Some(50_000)
        );
        assert_eq!(
            rule(&WORK_RULES, "work_total_prefix").find_count("work total 7,000 words"),
            Some(7_000)
        );
        assert_eq!(
            rule(&WORK_RULES, "words_total_suffix").find_count("42,000 words total"),
            Some(42_000)
        );
        assert_eq!(
            rule(&WORK_RULES, "words_work_suffix").find_count("8,000 words (work so far)"),
            Some(8_000)
        );
    }

    #[test]
    fn test_top_total_with_labelled_chapter() {
        let text = "Jane posted Chapter 5 of My Story ( 12,345 words):\n...Chapter 5 (678 words)...";
        assert_eq!(
            word_counts(text),
            WordCounts {
                chapter: Some(678),
                work: Some(12_345),
            }
        );
    }

    #[test]
    fn test_top_total_only_searched_near_the_top() {
        let padding = "x".repeat(600);
        let text = format!("{}jane posted Story (15,000 words)", padding);
        // Falls through to the unlabelled heuristic instead.
        assert_eq!(
            word_counts(&text),
            WordCounts {
                chapter: None,
                work: Some(15_000),
            }
        );
    }

    #[test]
    fn test_top_window_respects_char_boundaries() {
        let text = "é".repeat(600);
        assert_eq!(top_window(&text).chars().count(), TOP_WINDOW_CHARS);
    }

    #[test]
    fn test_labelled_total_used_when_no_top_line() {
        let text = "Chapter 3 (2,000 words)\nWork total: 30,000 words";
        assert_eq!(
            word_counts(text),
            WordCounts {
                chapter: Some(2_000),
                work: Some(30_000),
            }
        );
    }

    #[test]
    fn test_overflowing_number_falls_through() {
        let text = "Chapter 1 (99999999999 words) and 1,200 words in this chapter";
        assert_eq!(word_counts(text).chapter, Some(1_200));
    }

    // Heuristic: a lone count above 10,000 is taken as the work total.
    #[test]
    fn test_heuristic_single_large_count_is_work_total() {
        assert_eq!(
            word_counts("15000 words"),
            WordCounts {
                chapter: None,
                work: Some(15_000),
            }
        );
    }

    // Heuristic: a lone count at or below 10,000 is taken as the chapter.
    #[test]
    fn test_heuristic_single_small_count_is_chapter() {
        assert_eq!(
            word_counts("800 words"),
            WordCounts {
                chapter: Some(800),
                work: None,
            }
        );
        assert_eq!(word_counts("10,000 words").chapter, Some(10_000));
    }

    // Heuristic: smallest unlabelled count is the chapter, largest the work.
    #[test]
    fn test_heuristic_smallest_and_largest() {
        let text = "A 3,000 words piece. Another 900 words. So far 45,000 words.";
        assert_eq!(
            word_counts(text),
            WordCounts {
                chapter: Some(900),
                work: Some(45_000),
            }
        );
    }

    #[test]
    fn test_unlabelled_skips_malformed_entries() {
        let text = "a, words then 700 words";
        assert_eq!(
            word_counts(text),
            WordCounts {
                chapter: Some(700),
                work: None,
            }
        );
    }

    #[test]
    fn test_no_counts() {
        assert_eq!(word_counts("nothing to see"), WordCounts::default());
    }
}
