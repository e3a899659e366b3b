use chrono::NaiveDate;
use regex::Regex;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|idx| idx as u32 + 1)
}

fn full_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    match raw.len() {
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

struct DatePattern {
    regex: Regex,
    build: fn(&regex::Captures) -> Option<NaiveDate>,
}

fn ymd(year: &str, month: u32, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(full_year(year)?, month, day.parse().ok()?)
}

fn date_patterns() -> Vec<DatePattern> {
    vec![
        // 2025-09-25
        DatePattern {
            regex: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap(),
            build: |c| ymd(&c[1], c[2].parse().ok()?, &c[3]),
        },
        // 25-Sep-25, 25 Sep 2025, 25-September-2025, 25 Sep, 2025
        DatePattern {
            regex: Regex::new(r"(?i)\b(\d{1,2})[-\s]([A-Za-z]{3,9})[-\s,]+(\d{4}|\d{2})\b").unwrap(),
            build: |c| ymd(&c[3], month_number(&c[2])?, &c[1]),
        },
        // Sep 25, 2025
        DatePattern {
            regex: Regex::new(r"(?i)\b([A-Za-z]{3,9})\s+(\d{1,2}),?\s+(\d{4})\b").unwrap(),
            build: |c| ymd(&c[3], month_number(&c[1])?, &c[2]),
        },
        // 25/09/2025, 25-09-25, 25.09.2025 (day first)
        DatePattern {
            regex: Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\b").unwrap(),
            build: |c| ymd(&c[3], c[2].parse().ok()?, &c[1]),
        },
    ]
}

/// First recognizable calendar date in `text`
pub fn find_date(text: &str) -> Option<NaiveDate> {
    date_patterns().iter().find_map(|pattern| {
        pattern
            .regex
            .captures_iter(text)
            .find_map(|c| (pattern.build)(&c))
    })
}

/// Parses a standalone date string in any of the supported layouts
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    find_date(trimmed)
}

/// Midnight UTC of `date` as unix seconds
pub fn midnight_utc(date: NaiveDate) -> Option<i64> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}
