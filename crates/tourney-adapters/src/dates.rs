//! Date parsing for single values and free-text ranges.
//!
//! Nothing here fails: text that does not parse yields `None`.

use std::sync::LazyLock;

use chrono::{Datelike, DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

const SINGLE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d %b %Y", "%d %B %Y", "%d/%m/%Y"];

static NUMERIC_TRIPLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})[-/ ](\d{1,2})[-/ ](\d{2,4})").expect("valid numeric date regex")
});

static COMPACT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\s*[-\x{2013}]\s*(\d{1,2})\s+([A-Za-z]{3,9})\.?\s+(\d{4})")
        .expect("valid compact range regex")
});

// Scanned in this order when no compact range is present.
static RANGE_TOKENS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\b\d{1,2}\s+[A-Za-z]{3,9}\.?\s+\d{4}\b").expect("valid month-name regex"),
        Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b").expect("valid slash-date regex"),
        Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid iso-date regex"),
    ]
});

/// Parses one date, keeping only the calendar part of date-times.
pub fn parse_single_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }

    let cleaned = text.replace('.', "");
    // chrono accepts short `%Y` values; those belong to the two-digit fallback below.
    for fmt in SINGLE_FORMATS {
        match NaiveDate::parse_from_str(&cleaned, fmt) {
            Ok(date) if date.year() >= 1000 => return Some(date),
            _ => {}
        }
    }

    let caps = NUMERIC_TRIPLET.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = match caps[3].len() {
        2 => 2000 + caps[3].parse::<i32>().ok()?,
        4 => caps[3].parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Full or abbreviated English month name to month number.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim_end_matches('.').to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    MONTHS
        .iter()
        .position(|m| m.starts_with(&lower))
        .map(|idx| idx as u32 + 1)
}

/// Pulls a start/end pair out of free text.
///
/// The end date is not checked against the start date; callers may see an inverted range.
pub fn extract_date_range(text: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    if let Some(range) = compact_range(text) {
        return range;
    }

    let mut found: Vec<NaiveDate> = Vec::with_capacity(2);
    for pattern in RANGE_TOKENS.iter() {
        for m in pattern.find_iter(text) {
            let Some(date) = parse_single_date(m.as_str()) else {
                continue;
            };
            if !found.contains(&date) {
                found.push(date);
            }
            if found.len() == 2 {
                return (Some(found[0]), Some(found[1]));
            }
        }
    }
    (found.first().copied(), None)
}

fn compact_range(text: &str) -> Option<(Option<NaiveDate>, Option<NaiveDate>)> {
    let caps = COMPACT_RANGE.captures(text)?;
    let month = month_from_name(&caps[3])?;
    let year: i32 = caps[4].parse().ok()?;
    let start = NaiveDate::from_ymd_opt(year, month, caps[1].parse().ok()?)?;
    let end = NaiveDate::from_ymd_opt(year, month, caps[2].parse().ok()?)?;
    Some((Some(start), Some(end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn single_date_formats_in_order() {
        assert_eq!(parse_single_date("2025-06-12"), Some(d(2025, 6, 12)));
        assert_eq!(parse_single_date("12 Jun 2025"), Some(d(2025, 6, 12)));
        assert_eq!(parse_single_date(" 12 June 2025 "), Some(d(2025, 6, 12)));
        assert_eq!(parse_single_date("12/06/2025"), Some(d(2025, 6, 12)));
    }

    #[test]
    fn date_times_keep_only_the_calendar_date() {
        assert_eq!(parse_single_date("2025-06-12T09:30:00"), Some(d(2025, 6, 12)));
        assert_eq!(parse_single_date("2025-06-12T23:30:00+03:00"), Some(d(2025, 6, 12)));
        assert_eq!(parse_single_date("2025-06-12T09:30:00Z"), Some(d(2025, 6, 12)));
    }

    #[test]
    fn numeric_triplet_fallback_promotes_two_digit_years() {
        assert_eq!(parse_single_date("Starts 3-7-25"), Some(d(2025, 7, 3)));
        assert_eq!(parse_single_date("on 3 7 2025 local"), Some(d(2025, 7, 3)));
        assert_eq!(parse_single_date("12/06/25"), Some(d(2025, 6, 12)));
    }

    #[test]
    fn unparseable_text_is_none() {
        assert_eq!(parse_single_date(""), None);
        assert_eq!(parse_single_date("TBA"), None);
        assert_eq!(parse_single_date("31/02/2025"), None);
    }

    #[test]
    fn compact_same_month_range() {
        assert_eq!(
            extract_date_range("12-18 June 2025"),
            (Some(d(2025, 6, 12)), Some(d(2025, 6, 18)))
        );
        assert_eq!(
            extract_date_range("Played 3 \u{2013} 9 Aug 2025 on clay"),
            (Some(d(2025, 8, 3)), Some(d(2025, 8, 9)))
        );
    }

    #[test]
    fn generic_two_token_range() {
        assert_eq!(
            extract_date_range("Event runs 2025-06-12 to 2025-06-18"),
            (Some(d(2025, 6, 12)), Some(d(2025, 6, 18)))
        );
        assert_eq!(
            extract_date_range("From 30 June 2025 until 6 July 2025"),
            (Some(d(2025, 6, 30)), Some(d(2025, 7, 6)))
        );
    }

    #[test]
    fn month_name_tokens_take_priority_over_iso_tokens() {
        assert_eq!(
            extract_date_range("Updated 2025-01-01. Dates: 5 May 2025 - 11 May 2025"),
            (Some(d(2025, 5, 5)), Some(d(2025, 5, 11)))
        );
    }

    #[test]
    fn repeated_dates_are_collapsed_and_inversions_kept() {
        assert_eq!(
            extract_date_range("2025-06-12, again 2025-06-12"),
            (Some(d(2025, 6, 12)), None)
        );
        assert_eq!(
            extract_date_range("2025-06-18 then 2025-06-12"),
            (Some(d(2025, 6, 18)), Some(d(2025, 6, 12)))
        );
        assert_eq!(extract_date_range("no dates here"), (None, None));
    }

    #[test]
    fn month_names_resolve() {
        assert_eq!(month_from_name("Sept"), Some(9));
        assert_eq!(month_from_name("DEC"), Some(12));
        assert_eq!(month_from_name("Ma"), None);
        assert_eq!(month_from_name("Foo"), None);
    }
}
