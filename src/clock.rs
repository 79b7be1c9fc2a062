//! Canonical clock for the service.
//!
//! All business time flows through here. The service runs on a fixed
//! UTC+9 wall clock regardless of host timezone; license expiry is a
//! date-only comparison against that clock, so a license expiring
//! "today" stays usable until local midnight.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::error::{AppError, Result};

const UTC_OFFSET_HOURS: i32 = 9;

fn zone() -> FixedOffset {
    // 9 hours is always a valid offset
    FixedOffset::east_opt(UTC_OFFSET_HOURS * 3600).expect("valid fixed offset")
}

/// Current wall-clock time in the service zone.
pub fn now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&zone())
}

/// Current unix timestamp in seconds.
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// Today's date in the service zone.
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// Unix timestamp `days` days before now. Used for retention cutoffs.
pub fn cutoff_ts(days: i64) -> i64 {
    now_ts() - days * 86400
}

/// Parses a user-supplied expiry date. Accepts `YYYY-MM-DD` or a full
/// RFC 3339 timestamp (the date part is kept, converted to the service
/// zone first).
pub fn parse_expiry_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&zone()).date_naive());
    }
    Err(AppError::BadRequest(format!(
        "Invalid date format: {} (expected YYYY-MM-DD)",
        trimmed
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expiry_date_plain() {
        let d = parse_expiry_date("2030-01-31").unwrap();
        assert_eq!(d.to_string(), "2030-01-31");
    }

    #[test]
    fn test_parse_expiry_date_rfc3339_converts_zone() {
        // 23:00 UTC is already the next day at UTC+9
        let d = parse_expiry_date("2030-01-31T23:00:00Z").unwrap();
        assert_eq!(d.to_string(), "2030-02-01");
    }

    #[test]
    fn test_parse_expiry_date_rejects_garbage() {
        assert!(parse_expiry_date("31/01/2030").is_err());
        assert!(parse_expiry_date("").is_err());
    }
}
