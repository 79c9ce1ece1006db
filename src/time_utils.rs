// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and bucketing.

use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Convert epoch seconds into a timestamp in `tz`.
///
/// Out-of-range values clamp to the epoch.
pub fn local_time(epoch_secs: i64, tz: Tz) -> DateTime<Tz> {
    let utc = DateTime::<Utc>::from_timestamp(epoch_secs, 0).unwrap_or(DateTime::UNIX_EPOCH);
    tz.from_utc_datetime(&utc.naive_utc())
}

/// ISO 8601 week bucket key, `YYYY-Www`.
///
/// Uses the ISO week-year, so late-December days can belong to week 1 of
/// the following year. Lexical order of keys is chronological.
pub fn week_bucket_key(epoch_secs: i64, tz: Tz) -> String {
    let week = local_time(epoch_secs, tz).iso_week();
    format!("{:04}-W{:02}", week.year(), week.week())
}

/// Hour of day (0-23) in `tz`.
pub fn local_hour(epoch_secs: i64, tz: Tz) -> u32 {
    local_time(epoch_secs, tz).hour()
}
