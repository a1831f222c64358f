use chrono::{Local, NaiveDate, TimeZone};

/// Formats a MySQL `DATE` as `YYYY-MM-DD`.
pub fn format_date(year: i32, month: u32, day: u32) -> String {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => format!("{year:04}-{month:02}-{day:02}"),
    }
}

/// Formats a MySQL `TIME` as `HH:MM:SS`, allowing hour to exceed 24 as MySQL does.
pub fn format_time(hour: i32, minute: u32, second: u32) -> String {
    format!("{hour:02}:{minute:02}:{second:02}")
}

/// Formats a MySQL `DATETIME`/`TIMESTAMP` as `YYYY-MM-DD HH:MM:SS`.
pub fn format_datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> String {
    match NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
    {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"),
    }
}

/// Converts Unix seconds to a local-time `YYYY-MM-DD HH:MM:SS` string
/// (MySQL `TIMESTAMP`/`TIMESTAMP2` decoding, §4.7: "convert to broken-down
/// local time").
pub fn format_unix_timestamp(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => secs.to_string(),
    }
}
