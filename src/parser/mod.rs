pub mod fields;
pub mod locale;
pub mod segment;

use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::Clipping;
use fields::{extract_block, Extracted, SkipReason};
use locale::{detect_locale, Locale};
use segment::segment_blocks;

/// What a single pass over an export produced, including what was dropped.
#[derive(Debug, Clone)]
pub struct ParseReport {
    pub locale: Option<Locale>,
    pub blocks: usize,
    pub clippings: Vec<Clipping>,
    pub skipped: Vec<(usize, SkipReason)>,
}

impl ParseReport {
    /// Clippings whose date could not be read and were stamped with the epoch.
    pub fn epoch_dated(&self) -> usize {
        let epoch = DateTime::<Utc>::from(UNIX_EPOCH);
        self.clippings.iter().filter(|c| c.created_at == epoch).count()
    }
}

/// Two-pass pipeline: text → raw blocks → clippings. Never fails; malformed
/// blocks are dropped. The binary wants the skip details, so it calls
/// [`parse_report`] instead.
#[cfg(test)]
pub fn parse(text: &str) -> Vec<Clipping> {
    parse_report(text).clippings
}

pub fn parse_report(text: &str) -> ParseReport {
    let cleaned = text.replace('\u{feff}', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return ParseReport {
            locale: None,
            blocks: 0,
            clippings: Vec::new(),
            skipped: Vec::new(),
        };
    }

    let locale = detect_locale(cleaned);
    let blocks = segment_blocks(cleaned);
    let mut clippings = Vec::with_capacity(blocks.len());
    let mut skipped = Vec::new();

    for (idx, block) in blocks.iter().enumerate() {
        match extract_block(block, locale) {
            Extracted::Clipping(c) => clippings.push(c),
            Extracted::Skipped(reason) => {
                debug!("Skipping block {}: {}", idx, reason);
                skipped.push((idx, reason));
            }
        }
    }

    debug!(
        "Parsed {} of {} blocks as {:?}",
        clippings.len(),
        blocks.len(),
        locale
    );

    ParseReport {
        locale: Some(locale),
        blocks: blocks.len(),
        clippings,
        skipped,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClippingInput;
    use chrono::TimeZone;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.txt", name)).unwrap()
    }

    const ONE_EN: &str = "The Great Gatsby (F. Scott Fitzgerald)
- Your Highlight on page 7 | location 100-101 | Added on Monday, April 1, 2024 2:30:45 PM

In his blue gardens men and girls came and went like moths.
==========
";

    #[test]
    fn empty_input() {
        assert!(parse("").is_empty());
        assert!(parse(" \n\t\r\n").is_empty());
        assert!(parse("\u{feff}").is_empty());
        assert_eq!(parse_report("").locale, None);
    }

    #[test]
    fn trailing_separator_yields_one_clipping() {
        let out = parse(ONE_EN);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "The Great Gatsby");
        assert_eq!(out[0].location, "#100-101");
    }

    #[test]
    fn invalid_structure_yields_nothing() {
        let report = parse_report("Some Title\nInvalid structure");
        assert!(report.clippings.is_empty());
        assert_eq!(report.skipped, vec![(0, SkipReason::TooFewLines(2))]);
    }

    #[test]
    fn info_line_without_pipe_drops_block() {
        let text = "Dune (Frank Herbert)\n- Your Highlight on page 9\n\nFear is the mind-killer.\n==========\n";
        let report = parse_report(text);
        assert!(report.clippings.is_empty());
        assert_eq!(report.skipped[0], (0, SkipReason::MalformedInfo));
    }

    #[test]
    fn eight_equals_separates_clippings() {
        let text = ONE_EN.replace("==========", "========") + ONE_EN;
        assert_eq!(parse(&text).len(), 2);
    }

    #[test]
    fn bom_prefixed_input() {
        let out = parse(&format!("\u{feff}{}", ONE_EN));
        assert_eq!(out.len(), 1);
        assert!(!out[0].title.contains('\u{feff}'));
    }

    #[test]
    fn crlf_input() {
        let out = parse(&ONE_EN.replace('\n', "\r\n"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "In his blue gardens men and girls came and went like moths.");
    }

    #[test]
    fn locale_is_decided_once_for_the_whole_file() {
        let mixed = format!(
            "{}深度工作 (卡尔·纽波特)\n- 您在位置 #42-43的标注 | 添加于 2024年4月1日星期一 下午2:30:45\n\n专注力就像肌肉一样。\n==========",
            ONE_EN
        );
        let report = parse_report(&mixed);
        assert_eq!(report.locale, Some(Locale::English));
        assert_eq!(report.clippings.len(), 2);
        // English rules: no `#` in the pattern, Chinese date grammar unavailable
        assert_eq!(report.clippings[1].location, "#42-43");
        assert_eq!(report.epoch_dated(), 1);
    }

    #[test]
    fn english_fixture() {
        let report = parse_report(&fixture("clippings_en"));
        assert_eq!(report.locale, Some(Locale::English));
        assert_eq!(report.blocks, 6);
        assert_eq!(report.clippings.len(), 4);
        assert_eq!(report.skipped.len(), 2);

        let first = &report.clippings[0];
        assert_eq!(first.title, "The Great Gatsby");
        assert_eq!(first.location, "#100-101");
        assert_eq!(first.created_at, Utc.with_ymd_and_hms(2024, 4, 1, 14, 30, 45).unwrap());

        let titles: Vec<&str> = report.clippings.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["The Great Gatsby", "Another Book", "Sapiens", "The Great Gatsby"]
        );
        assert_eq!(report.clippings[2].location, "#1406-1407");
        assert_eq!(report.epoch_dated(), 1);
    }

    #[test]
    fn chinese_fixture() {
        let report = parse_report(&fixture("clippings_zh"));
        assert_eq!(report.locale, Some(Locale::Chinese));
        assert_eq!(report.clippings.len(), 3);

        let first = &report.clippings[0];
        assert_eq!(first.title, "深度工作");
        assert_eq!(first.location, "#42-43");
        assert_eq!(first.created_at, Utc.with_ymd_and_hms(2024, 4, 1, 14, 30, 45).unwrap());

        let second = &report.clippings[1];
        assert_eq!(second.title, "人类简史");
        assert_eq!(second.created_at, Utc.with_ymd_and_hms(2020, 3, 6, 10, 4, 19).unwrap());
    }

    #[test]
    fn parsing_is_idempotent() {
        for name in ["clippings_en", "clippings_zh"] {
            let text = fixture(name);
            assert_eq!(parse(&text), parse(&text));
        }
    }

    #[test]
    fn wire_timestamp_round_trips() {
        for name in ["clippings_en", "clippings_zh"] {
            for c in parse(&fixture(name)) {
                let wire = ClippingInput::from(&c);
                let back = DateTime::parse_from_rfc3339(&wire.created_at)
                    .unwrap()
                    .with_timezone(&Utc);
                assert_eq!(back, c.created_at, "{}", wire.created_at);
            }
        }
    }
}
