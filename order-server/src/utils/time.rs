//! Time helpers — business time zone conversion
//!
//! All date→timestamp conversion happens here; repositories and the
//! aggregator only ever see `i64` Unix millis.

use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::Tz;

use super::{AppError, AppResult};

/// Parse a date string (YYYY-MM-DD)
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::invalid_argument(format!("Invalid date format: {}", date)))
}

/// Date + hour/min/sec → Unix millis in the business time zone
///
/// DST gap fallback: if the local time does not exist, fall back to UTC.
pub fn date_hms_to_millis(date: NaiveDate, hour: u32, min: u32, sec: u32, tz: Tz) -> i64 {
    let naive = date.and_hms_opt(hour, min, sec).unwrap();
    naive
        .and_local_timezone(tz)
        .latest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// Start of day (00:00:00) → Unix millis in the business time zone
pub fn day_start_millis(date: NaiveDate, tz: Tz) -> i64 {
    date_hms_to_millis(date, 0, 0, 0, tz)
}

/// End of day → next day 00:00:00 Unix millis, for `< end` semantics
pub fn day_end_millis(date: NaiveDate, tz: Tz) -> i64 {
    let next_day = date.succ_opt().unwrap_or(date);
    date_hms_to_millis(next_day, 0, 0, 0, tz)
}

/// The prior calendar day in the business time zone
pub fn previous_day(tz: Tz) -> NaiveDate {
    let today = chrono::Utc::now().with_timezone(&tz).date_naive();
    today - Duration::days(1)
}

/// Year-month key (YYYY-MM) for a date
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}
