use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use thiserror::Error;

const MAX_TAGS: usize = 20;

static TAG_FINDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\B#(\w{2,})").expect("tag pattern must compile"));

/// A duration split into whole hours and the remaining whole minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoursMins {
    pub hours: i64,
    pub mins: i64,
}

impl HoursMins {
    pub fn from_duration(duration: Duration) -> Self {
        let duration = duration.max(Duration::zero());
        let hours = duration.num_hours();
        let mins = duration.num_minutes() - hours * 60;
        Self { hours, mins }
    }
}

impl fmt::Display for HoursMins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.hours, self.mins)
    }
}

/// Renders a duration as `H:MM`.
pub fn hm(duration: Duration) -> String {
    HoursMins::from_duration(duration).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDurationError {
    #[error("duration is empty")]
    Empty,
    #[error("negative durations are not allowed")]
    Negative,
    #[error("invalid duration '{0}'")]
    Invalid(String),
    #[error("missing unit in duration '{0}'")]
    MissingUnit(String),
    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { unit: String, input: String },
    #[error("duration '{0}' is too large")]
    Overflow(String),
}

/// Parses durations such as `1h30m`, `45m`, `90s`, `1.5h` or `250ms`.
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(ParseDurationError::Empty);
    }
    if raw.starts_with('-') {
        return Err(ParseDurationError::Negative);
    }

    let mut rest = raw.strip_prefix('+').unwrap_or(raw);
    if rest == "0" {
        return Ok(Duration::zero());
    }
    if rest.is_empty() {
        return Err(ParseDurationError::Invalid(raw.to_string()));
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if number.is_empty() || number == "." {
            return Err(ParseDurationError::Invalid(raw.to_string()));
        }
        let value = number
            .parse::<f64>()
            .map_err(|_| ParseDurationError::Invalid(raw.to_string()))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        if unit.is_empty() {
            return Err(ParseDurationError::MissingUnit(raw.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| ParseDurationError::UnknownUnit {
            unit: unit.to_string(),
            input: raw.to_string(),
        })?;
        rest = &rest[unit_len..];

        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos >= i64::MAX as f64 {
        return Err(ParseDurationError::Overflow(raw.to_string()));
    }

    Ok(Duration::nanoseconds(total_nanos.round() as i64))
}

fn unit_nanos(unit: &str) -> Option<f64> {
    match unit {
        "ns" => Some(1.0),
        "us" | "µs" | "μs" => Some(1e3),
        "ms" => Some(1e6),
        "s" => Some(1e9),
        "m" => Some(60.0 * 1e9),
        "h" => Some(3600.0 * 1e9),
        _ => None,
    }
}

/// Finds `#word` tags in free text and returns them normalized.
///
/// A tag needs at least two word characters and must not be glued to a
/// preceding word character (`a#tag` is not a tag). At most twenty matches
/// are considered.
pub fn extract_tags(content: &str) -> Vec<String> {
    let found = TAG_FINDER
        .captures_iter(content)
        .take(MAX_TAGS)
        .filter_map(|captures| captures.get(1))
        .map(|tag| tag.as_str().to_string())
        .collect::<Vec<_>>();
    normalize_tags(&found)
}

/// Deduplicates case-insensitively (first casing wins) and sorts by lowercase.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for tag in tags {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            normalized.push(trimmed.to_string());
        }
    }
    normalized.sort_by_key(|tag| tag.to_lowercase());
    normalized
}

pub fn local_day(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

/// Half-open `[first instant of month, first instant of next month)` in local time.
pub fn month_bounds(year: i32, month: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let (next_year, next_month) = shift_month(year, month, 1);
    (
        local_midnight(year, month, 1),
        local_midnight(next_year, next_month, 1),
    )
}

pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

pub fn current_year_month() -> (i32, u32) {
    let today = Local::now().date_naive();
    (today.year(), today.month())
}

fn local_midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    local_naive_to_utc_resolved(naive)
}

fn local_naive_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(local_datetime) => Some(local_datetime.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => Some(first.min(second).with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

// Midnight can fall inside a DST gap; walk forward to the first valid minute.
fn local_naive_to_utc_resolved(naive: NaiveDateTime) -> DateTime<Utc> {
    let mut cursor = naive;
    for _ in 0..=120 {
        if let Some(timestamp) = local_naive_to_utc(cursor) {
            return timestamp;
        }
        cursor += Duration::minutes(1);
    }
    Utc.from_utc_datetime(&naive)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, TimeZone};
    use rstest::rstest;

    use super::{extract_tags, hm, month_bounds, normalize_tags, parse_duration, shift_month, HoursMins, ParseDurationError};

    #[rstest]
    #[case(Duration::zero(), "0:00")]
    #[case(Duration::minutes(59), "0:59")]
    #[case(Duration::minutes(90), "1:30")]
    #[case(Duration::hours(1) + Duration::seconds(45), "1:00")]
    #[case(Duration::hours(28) + Duration::minutes(125), "30:05")]
    #[case(Duration::hours(12) + Duration::minutes(45), "12:45")]
    fn formats_hours_and_minutes(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(hm(duration), expected);
    }

    #[test]
    fn splits_hours_and_minutes() {
        assert_eq!(
            HoursMins::from_duration(Duration::hours(3) + Duration::minutes(15)),
            HoursMins { hours: 3, mins: 15 }
        );
        assert_eq!(HoursMins::from_duration(Duration::seconds(-30)), HoursMins::default());
    }

    #[rstest]
    #[case("1h30m", Duration::minutes(90))]
    #[case("45m", Duration::minutes(45))]
    #[case("45s", Duration::seconds(45))]
    #[case("1.5h", Duration::minutes(90))]
    #[case("250ms", Duration::milliseconds(250))]
    #[case(" 2h ", Duration::hours(2))]
    #[case("0", Duration::zero())]
    fn parses_durations(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input).expect("duration should parse"), expected);
    }

    #[test]
    fn rejects_bad_durations() {
        assert_eq!(parse_duration(""), Err(ParseDurationError::Empty));
        assert_eq!(parse_duration("-5m"), Err(ParseDurationError::Negative));
        assert!(matches!(parse_duration("90"), Err(ParseDurationError::MissingUnit(_))));
        assert!(matches!(parse_duration("3d"), Err(ParseDurationError::UnknownUnit { .. })));
        assert!(matches!(parse_duration("h"), Err(ParseDurationError::Invalid(_))));
    }

    #[test]
    fn extracts_tags_case_insensitively() {
        assert_eq!(
            extract_tags("a #One and #one and #TWO and #a"),
            vec!["One".to_string(), "TWO".to_string()]
        );
    }

    #[test]
    fn tag_at_start_of_text_matches() {
        assert_eq!(extract_tags("#foo fixed"), vec!["foo".to_string()]);
    }

    #[test]
    fn tag_glued_to_word_is_ignored() {
        assert!(extract_tags("issue#42 and mail@host#xx").is_empty());
        assert_eq!(extract_tags("(#review)"), vec!["review".to_string()]);
    }

    #[test]
    fn caps_tag_matches_at_twenty() {
        let content = (0..25).map(|index| format!("#tag{index:02}")).collect::<Vec<_>>().join(" ");
        assert_eq!(extract_tags(&content).len(), 20);
    }

    #[test]
    fn normalizes_tags() {
        assert_eq!(
            normalize_tags(&["  beta", "Alpha", "", "BETA", "alpha "]),
            vec!["Alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn shifts_months_across_years() {
        assert_eq!(shift_month(2024, 1, -1), (2023, 12));
        assert_eq!(shift_month(2024, 12, 1), (2025, 1));
        assert_eq!(shift_month(2024, 5, -17), (2022, 12));
    }

    #[test]
    fn month_bounds_are_local_midnights() {
        let (start, end) = month_bounds(2024, 2);
        let expected_start = Local.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).earliest().expect("valid local time");
        let expected_end = Local.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).earliest().expect("valid local time");
        assert_eq!(start, expected_start);
        assert_eq!(end, expected_end);
    }
}
