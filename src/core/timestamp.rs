//! Timestamp formatting utilities
//!
//! Records carry local-time ISO 8601 timestamps with millisecond precision
//! (`2025-01-08T10:30:45.123+0800`, `Z` for UTC). Rotated backups embed a
//! filesystem-safe variant of the same instant in their file name.

use chrono::{DateTime, Local, NaiveDateTime, Offset, TimeZone};

/// strftime pattern embedded in rotated backup names
pub const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// Format a timestamp as ISO 8601 with milliseconds and a compact offset
///
/// # Examples
///
/// ```
/// use chrono::{FixedOffset, TimeZone};
/// use logkit::core::timestamp::format_iso8601;
///
/// let tz = FixedOffset::east_opt(8 * 3600).unwrap();
/// let ts = tz.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// assert_eq!(format_iso8601(&ts), "2025-01-08T10:30:45.000+0800");
/// ```
#[must_use]
pub fn format_iso8601<Tz>(datetime: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let base = datetime.format("%Y-%m-%dT%H:%M:%S%.3f");
    if datetime.offset().fix().local_minus_utc() == 0 {
        format!("{}Z", base)
    } else {
        format!("{}{}", base, datetime.format("%z"))
    }
}

/// Format the backup-name stamp for a rotation happening at `datetime`
#[must_use]
pub fn format_backup_time(datetime: &DateTime<Local>) -> String {
    datetime.format(BACKUP_TIME_FORMAT).to_string()
}

/// Parse a backup-name stamp back into local time
///
/// Returns `None` for names that were not produced by [`format_backup_time`].
#[must_use]
pub fn parse_backup_time(stamp: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}
