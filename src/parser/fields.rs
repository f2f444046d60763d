use std::fmt;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, TimeZone, Utc};

use super::locale::{Locale, LocaleRules};
use super::segment::{clean_line, RawBlock};
use crate::models::Clipping;

const MIN_BLOCK_LINES: usize = 4;
const TITLE_STOPS: &[char] = &['(', '（'];
const TITLE_CLOSERS: &[char] = &[')', '）'];

/// Outcome of extracting one block. Skipped blocks keep their reason so the
/// engine can count and log them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Clipping(Clipping),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooFewLines(usize),
    EmptyTitle,
    /// Info line without a `|` between location and date.
    MalformedInfo,
    EmptyContent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooFewLines(n) => {
                write!(f, "block has {} lines, need at least {}", n, MIN_BLOCK_LINES)
            }
            SkipReason::EmptyTitle => write!(f, "empty title"),
            SkipReason::MalformedInfo => write!(f, "info line has no '|' separator"),
            SkipReason::EmptyContent => write!(f, "empty content"),
        }
    }
}

/// Block layout: title, info, blank, content.
pub fn extract_block(block: &RawBlock, locale: Locale) -> Extracted {
    if block.len() < MIN_BLOCK_LINES {
        return Extracted::Skipped(SkipReason::TooFewLines(block.len()));
    }
    let rules = locale.rules();

    let title = extract_title(block.line(0).unwrap_or_default());
    if title.is_empty() {
        return Extracted::Skipped(SkipReason::EmptyTitle);
    }

    let Some((location, created_at)) = extract_info(block.line(1).unwrap_or_default(), rules)
    else {
        return Extracted::Skipped(SkipReason::MalformedInfo);
    };

    let content = block.line(3).unwrap_or_default().trim();
    if content.is_empty() {
        return Extracted::Skipped(SkipReason::EmptyContent);
    }

    Extracted::Clipping(Clipping {
        title,
        content: content.to_string(),
        location,
        created_at,
    })
}

/// Book title with any `(Author)` annotation removed.
pub fn extract_title(line: &str) -> String {
    let mut title = clean_line(line);
    for stop in TITLE_STOPS {
        if let Some(idx) = title.find(*stop) {
            title = &title[..idx];
        }
    }
    for closer in TITLE_CLOSERS {
        title = title.strip_suffix(*closer).unwrap_or(title);
    }
    title.trim().to_string()
}

/// Location and timestamp from the `|`-separated info line. `None` when the
/// line has a single segment.
fn extract_info(line: &str, rules: &LocaleRules) -> Option<(String, DateTime<Utc>)> {
    let segments: Vec<&str> = line.split('|').collect();
    let (date_segment, leading) = segments.split_last()?;
    let first = leading.first()?;

    let location_segment = leading
        .iter()
        .find(|s| s.to_lowercase().contains(rules.location_label))
        .unwrap_or(first);

    Some((
        extract_location(location_segment, rules),
        extract_date(date_segment, rules),
    ))
}

fn extract_location(segment: &str, rules: &LocaleRules) -> String {
    match rules.location.find(segment.trim()) {
        Some(m) if m.as_str().starts_with('#') => m.as_str().to_string(),
        Some(m) => format!("#{}", m.as_str()),
        None => String::new(),
    }
}

fn extract_date(segment: &str, rules: &LocaleRules) -> DateTime<Utc> {
    let raw = segment.trim().replacen(rules.added_on, "", 1);
    match (rules.parse_date)(raw.trim()) {
        Some(naive) => Utc.from_utc_datetime(&naive),
        None => DateTime::<Utc>::from(UNIX_EPOCH),
    }
}
