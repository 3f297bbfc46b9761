/// Card content parser.
///
/// Cards are plain markdown. Two inline conventions carry metadata:
///   #tag  or  [tag:name]         -> tags
///   [due:VALUE]  or  due: Y-M-D  -> due date
///
/// Parsing never fails: content without a recognized marker simply has no
/// tags or no due date.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Tags and due date derived from one card's content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedContent {
    pub tags: Vec<String>,
    pub due_date: Option<String>,
}

pub fn parse_content(content: &str) -> ParsedContent {
    ParsedContent {
        tags: extract_tags(content),
        due_date: extract_due_date(content),
    }
}

fn hash_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)#([^\s#@\[\]]+)").expect("valid hash tag regex"))
}

fn bracket_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[tag:([^\]]*)\]").expect("valid bracket tag regex"))
}

fn bracket_due_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[due:([^\]]*)\]").expect("valid bracket due regex"))
}

fn inline_due_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|\s)(?:due:\s*|@due\(\s*)(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})")
            .expect("valid inline due regex")
    })
}

/// Extract distinct tag names in first-occurrence order.
///
/// Names are returned without the `#` marker and compared case-sensitively.
/// Purely numeric `#123` tokens are issue references, not tags.
pub fn extract_tags(content: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for caps in hash_tag_regex().captures_iter(content) {
        if let Some(m) = caps.get(1) {
            let name = m.as_str().trim_end_matches(|c: char| ",.;)".contains(c));
            if name.is_empty() || name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            found.push((m.start(), name.to_string()));
        }
    }

    for caps in bracket_tag_regex().captures_iter(content) {
        if let Some(m) = caps.get(1) {
            let name = m.as_str().trim();
            if !name.is_empty() {
                found.push((m.start(), name.to_string()));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);

    let mut tags: Vec<String> = Vec::with_capacity(found.len());
    for (_, name) in found {
        if !tags.iter().any(|t| t == &name) {
            tags.push(name);
        }
    }
    tags
}

/// Extract the first due-date annotation.
///
/// `[due:VALUE]` passes VALUE through untouched (trimmed). `due: Y-M-D` is
/// zero-padded to `YYYY-MM-DD`. Neither form is checked against the calendar.
pub fn extract_due_date(content: &str) -> Option<String> {
    let bracket = bracket_due_regex()
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .find(|m| !m.as_str().trim().is_empty())
        .map(|m| (m.start(), m.as_str().trim().to_string()));

    let inline = inline_due_regex().captures(content).and_then(|caps| {
        let start = caps.get(0)?.start();
        let year = caps.get(1)?.as_str();
        let month = caps.get(2)?.as_str();
        let day = caps.get(3)?.as_str();
        Some((start, format!("{}-{:0>2}-{:0>2}", year, month, day)))
    });

    match (bracket, inline) {
        (Some(b), Some(i)) => Some(if b.0 <= i.0 { b.1 } else { i.1 }),
        (Some(b), None) => Some(b.1),
        (None, Some(i)) => Some(i.1),
        (None, None) => None,
    }
}

/// Interpret a due-date string as a calendar date, if it is one.
pub fn due_date_to_naive(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
