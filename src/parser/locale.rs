use std::sync::LazyLock;

use chrono::{NaiveDateTime, Weekday};
use regex::Regex;

const ENGLISH_MARKER: &str = "Your Highlight on";

static EN_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(-?\d+)?").unwrap());
static ZH_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#?\d+(-?\d+)?").unwrap());
static CJK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x{4E00}-\x{9FFF}\x{3000}-\x{303F}]").unwrap());
static DASH_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").unwrap());

const EN_DATE_FORMAT: &str = "%B %d, %Y %I:%M:%S %p";
const ZH_DATE_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    English,
    Chinese,
}

/// Everything the extractor needs to know about one export language.
pub struct LocaleRules {
    pub location: &'static LazyLock<Regex>,
    pub added_on: &'static str,
    pub location_label: &'static str,
    pub parse_date: fn(&str) -> Option<NaiveDateTime>,
}

static ENGLISH: LocaleRules = LocaleRules {
    location: &EN_LOCATION_RE,
    added_on: "Added on ",
    location_label: "location",
    parse_date: parse_english_date,
};

static CHINESE: LocaleRules = LocaleRules {
    location: &ZH_LOCATION_RE,
    added_on: "添加于 ",
    location_label: "位置",
    parse_date: parse_chinese_date,
};

impl Locale {
    pub fn rules(self) -> &'static LocaleRules {
        match self {
            Locale::English => &ENGLISH,
            Locale::Chinese => &CHINESE,
        }
    }
}

/// Classify the whole export once. Anything without the English marker is
/// treated as Chinese.
pub fn detect_locale(text: &str) -> Locale {
    if text.contains(ENGLISH_MARKER) {
        Locale::English
    } else {
        Locale::Chinese
    }
}

/// `Monday, April 1, 2024 2:30:45 PM`. The weekday must name a day but is
/// not cross-checked against the date.
fn parse_english_date(raw: &str) -> Option<NaiveDateTime> {
    let (weekday, rest) = raw.trim().split_once(',')?;
    weekday.trim().parse::<Weekday>().ok()?;
    NaiveDateTime::parse_from_str(rest.trim(), EN_DATE_FORMAT).ok()
}

/// `2024年4月1日星期一 下午2:30:45`. Anything without 上午 is read as PM.
fn parse_chinese_date(raw: &str) -> Option<NaiveDateTime> {
    let meridiem = if raw.contains("上午") { "AM" } else { "PM" };
    let dashed = CJK_RE.replace_all(raw, "-");
    let skeleton = DASH_RUN_RE.replace_all(&dashed, "");
    let normalized = format!("{} {}", skeleton.trim(), meridiem);
    NaiveDateTime::parse_from_str(&normalized, ZH_DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn detects_english_by_marker() {
        let text = "Book\n- Your Highlight on page 3 | Added on Monday, April 1, 2024 2:30:45 PM";
        assert_eq!(detect_locale(text), Locale::English);
    }

    #[test]
    fn everything_else_is_chinese() {
        assert_eq!(detect_locale("- 您在位置 #42-43的标注"), Locale::Chinese);
        assert_eq!(detect_locale("- Votre surlignement"), Locale::Chinese);
        assert_eq!(detect_locale(""), Locale::Chinese);
    }

    #[test]
    fn english_date_pm() {
        let parse = Locale::English.rules().parse_date;
        assert_eq!(
            parse("Monday, April 1, 2024 2:30:45 PM"),
            Some(at(2024, 4, 1, 14, 30, 45))
        );
    }

    #[test]
    fn english_date_midnight_and_noon() {
        let parse = Locale::English.rules().parse_date;
        assert_eq!(
            parse("Sunday, December 31, 2023 12:05:00 AM"),
            Some(at(2023, 12, 31, 0, 5, 0))
        );
        assert_eq!(
            parse("Sunday, December 31, 2023 12:05:00 PM"),
            Some(at(2023, 12, 31, 12, 5, 0))
        );
    }

    #[test]
    fn english_weekday_is_not_checked() {
        let parse = Locale::English.rules().parse_date;
        assert_eq!(
            parse("Friday, April 1, 2024 2:30:45 PM"),
            Some(at(2024, 4, 1, 14, 30, 45))
        );
    }

    #[test]
    fn english_garbage_is_none() {
        let parse = Locale::English.rules().parse_date;
        assert_eq!(parse("yesterday"), None);
        assert_eq!(parse("Monday, Smarch 1, 2024 2:30:45 PM"), None);
    }

    #[test]
    fn english_date_requires_a_weekday_name() {
        let parse = Locale::English.rules().parse_date;
        assert_eq!(parse("yesterday, April 1, 2024 2:30:45 PM"), None);
        assert_eq!(parse("April 1, 2024 2:30:45 PM"), None);
    }

    #[test]
    fn chinese_date_afternoon() {
        let parse = Locale::Chinese.rules().parse_date;
        assert_eq!(
            parse("2024年4月1日星期一 下午2:30:45"),
            Some(at(2024, 4, 1, 14, 30, 45))
        );
    }

    #[test]
    fn chinese_date_morning() {
        let parse = Locale::Chinese.rules().parse_date;
        assert_eq!(
            parse("2020年3月6日星期五 上午10:04:19"),
            Some(at(2020, 3, 6, 10, 4, 19))
        );
    }

    #[test]
    fn chinese_date_without_meridiem_defaults_to_pm() {
        let parse = Locale::Chinese.rules().parse_date;
        assert_eq!(
            parse("2020年3月6日星期五 9:04:19"),
            Some(at(2020, 3, 6, 21, 4, 19))
        );
    }

    #[test]
    fn chinese_24h_clock_does_not_parse() {
        let parse = Locale::Chinese.rules().parse_date;
        assert_eq!(parse("2020年3月6日星期五 21:04:19"), None);
    }

    #[test]
    fn location_patterns_differ_on_hash() {
        let en = Locale::English.rules().location;
        let zh = Locale::Chinese.rules().location;
        assert_eq!(en.find("#42-43").unwrap().as_str(), "42-43");
        assert_eq!(zh.find("#42-43").unwrap().as_str(), "#42-43");
    }
}
