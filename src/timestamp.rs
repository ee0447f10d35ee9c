// 📅 Timestamp Normalizer - calendar-aware date parsing
// Handles standard Gregorian forms, offset-calendar years and spreadsheet serials

use chrono::{Duration, NaiveDate, NaiveDateTime};

// ============================================================================
// PARSER CHAIN
// ============================================================================

/// Date+time formats accepted by the standard parser, tried in order
const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Date-only formats accepted by the standard parser (time defaults to midnight)
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Years below this value are offset-calendar years and get the offset added.
/// "112/01/01" means 2023-01-01, "0099/03/05" means 2010-03-05.
const OFFSET_YEAR_PIVOT: i32 = 1911;

/// Spreadsheet serial epoch (1899-12-30, which absorbs the 1900 leap-year bug)
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Plausible serial range: 1927 through roughly 2447. The lower bound keeps
/// bare year numbers like "2024" from being misread as 1905-era serials.
const SERIAL_RANGE: std::ops::RangeInclusive<f64> = 10_000.0..=200_000.0;

/// Normalize a raw cell value into a point in time.
///
/// Parsers are tried in order; the first success wins:
/// 1. standard Gregorian parse (ISO-like `YYYY-MM-DD` / `YYYY/MM/DD`, with
///    or without a time-of-day)
/// 2. offset-calendar parse (three numeric parts, small years get +1911)
/// 3. spreadsheet serial parse (bare day count from the 1899-12-30 epoch)
///
/// Anything else yields `None`; the caller decides what an unparsable
/// timestamp means for the row it came from.
pub fn normalize(value: &str) -> Option<NaiveDateTime> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }

    parse_standard(s)
        .or_else(|| parse_offset_calendar(s))
        .or_else(|| parse_serial(s))
}

/// Standard Gregorian parse over the known format list.
///
/// Rejects years below 1000: offset-calendar sources write the year with
/// two or three digits, and those strings must fall through to
/// `parse_offset_calendar` instead of being read as year 99 or 112.
fn parse_standard(s: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return guard_year(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return guard_year(date.and_hms_opt(0, 0, 0)?);
        }
    }

    None
}

fn guard_year(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    use chrono::Datelike;
    if dt.year() >= 1000 {
        Some(dt)
    } else {
        None
    }
}

/// Offset-calendar parse: split on `/` or `-` into exactly three numeric
/// parts `(y, m, d)`. A year below the pivot is an offset year and gets
/// +1911; a year at or above it is used as-is. Time-of-day is midnight.
///
/// The pivot check is unconditional: a two-digit year is never read as an
/// abbreviated Gregorian year.
fn parse_offset_calendar(s: &str) -> Option<NaiveDateTime> {
    let normalized = s.replace('-', "/");
    let parts: Vec<&str> = normalized.split('/').collect();
    if parts.len() != 3 {
        return None;
    }

    let y: i32 = parts[0].trim().parse().ok()?;
    let m: u32 = parts[1].trim().parse().ok()?;
    let d: u32 = parts[2].trim().parse().ok()?;

    let year = if y < OFFSET_YEAR_PIVOT { y + OFFSET_YEAR_PIVOT } else { y };

    // from_ymd_opt rejects bad month/day combinations (e.g. 13/45)
    NaiveDate::from_ymd_opt(year, m, d)?.and_hms_opt(0, 0, 0)
}

/// Spreadsheet serial parse: whole days since the epoch plus a fractional
/// time-of-day. Spreadsheet readers sometimes hand the underlying serial
/// through as text when a date cell lost its display format.
fn parse_serial(s: &str) -> Option<NaiveDateTime> {
    let serial: f64 = s.parse().ok()?;
    if !SERIAL_RANGE.contains(&serial) {
        return None;
    }

    let days = serial.floor() as i64;
    let day_seconds = ((serial - serial.floor()) * 86_400.0).round() as i64;

    let (ey, em, ed) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(ey, em, ed)?.and_hms_opt(0, 0, 0)?;

    epoch
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(day_seconds))
}

// ============================================================================
// TESTS
// ============================================================================
