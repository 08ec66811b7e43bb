//! Date and time helpers. All server-side timestamps use one fixed zone.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// The zone in which `Saved At` timestamps and receipt year-month folders are computed.
pub const TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

const SAVED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats `now` as a `Saved At` cell value, e.g. `2026-01-21 12:34:56`.
pub(crate) fn saved_at(now: DateTime<Utc>) -> String {
    now.with_timezone(&TIMEZONE)
        .format(SAVED_AT_FORMAT)
        .to_string()
}

/// A server-generated entry id: the current Unix time in milliseconds.
pub(crate) fn fallback_id(now: DateTime<Utc>) -> String {
    now.timestamp_millis().to_string()
}

/// Date layouts accepted on read. The last one is how a date value renders in an en_US sheet.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parses an entry date of the form `yyyy-MM-dd`. Anything after a `T` or a space is ignored so
/// that date-times are accepted too.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let date_part = s.trim().split(['T', ' ']).next().unwrap_or_default();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Returns the `yyyyMM` partition for an entry. The entry date is read at noon in the fixed zone;
/// when it is absent or malformed the current date in that zone is used.
pub(crate) fn year_month(date: Option<&str>, now: DateTime<Utc>) -> String {
    let local = date
        .and_then(parse_date)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .and_then(|noon: NaiveDateTime| TIMEZONE.from_local_datetime(&noon).single())
        .unwrap_or_else(|| now.with_timezone(&TIMEZONE));
    format!("{:04}{:02}", local.year(), local.month())
}

/// Normalizes a date cell for display. Cells that the sheet rendered as a date-time, with
/// slashes or in en_US order become `yyyy-MM-dd`; other text is returned with any `T...` suffix
/// removed.
pub(crate) fn normalize_date_cell(cell: &str) -> String {
    let cell = cell.trim();
    if cell.is_empty() {
        return String::new();
    }
    match parse_date(cell) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => cell.split('T').next().unwrap_or_default().to_string(),
    }
}
