//! Time utilities: timezone-aware scheduled times and duration fields.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse a scheduled time like "2026-02-20 09:30" in an IANA tz like "Asia/Tokyo",
/// returning UTC.
pub fn parse_local_to_utc(local: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz: Tz = tz
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))?;

    let ndt = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M")
        .map_err(|e| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

/// Parse a deadline date like "2026-02-20".
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date '{s}': {e}"))
}

/// Combine the separate hours/minutes inputs into total minutes.
///
/// Both absent (or both zero) means "no estimate".
/// A total that does not fit in an `i32` is treated as no estimate.
pub fn minutes_from_parts(hours: Option<i32>, minutes: Option<i32>) -> Option<i32> {
    let total = hours
        .unwrap_or(0)
        .max(0)
        .checked_mul(60)?
        .checked_add(minutes.unwrap_or(0).max(0))?;
    if total > 0 { Some(total) } else { None }
}

/// Strict form of `minutes_from_parts` for user input: negative parts and
/// overflowing totals are errors instead of being dropped.
pub fn checked_minutes(hours: Option<i32>, minutes: Option<i32>) -> Result<Option<i32>> {
    let (h, m) = (hours.unwrap_or(0), minutes.unwrap_or(0));
    if h < 0 || m < 0 {
        bail!("duration must not be negative ({h}h {m}m)");
    }
    let Some(total) = h.checked_mul(60).and_then(|t| t.checked_add(m)) else {
        bail!("duration too large ({h}h {m}m)");
    };
    Ok(if total > 0 { Some(total) } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokyo_scheduled_time() {
        // JST is UTC+9, no DST
        let utc = parse_local_to_utc("2026-02-20 09:30", "Asia/Tokyo").unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-02-20T00:30:00+00:00");
    }

    #[test]
    fn test_parse_rejects_unknown_timezone() {
        assert!(parse_local_to_utc("2026-02-20 09:30", "Mars/Olympus").is_err());
    }

    #[test]
    fn test_minutes_from_parts() {
        assert_eq!(minutes_from_parts(Some(1), Some(30)), Some(90));
        assert_eq!(minutes_from_parts(None, Some(45)), Some(45));
        assert_eq!(minutes_from_parts(None, None), None);
        assert_eq!(minutes_from_parts(Some(0), Some(0)), None);
        assert_eq!(minutes_from_parts(Some(40_000_000), None), None);
        assert_eq!(minutes_from_parts(Some(1), Some(i32::MAX)), None);
    }

    #[test]
    fn test_checked_minutes() {
        assert_eq!(checked_minutes(Some(2), None).unwrap(), Some(120));
        assert_eq!(checked_minutes(None, None).unwrap(), None);
        assert!(checked_minutes(Some(40_000_000), None).is_err());
        assert!(checked_minutes(None, Some(-5)).is_err());
    }

    #[test]
    fn test_parse_date() {
        let d = parse_date("2026-03-01").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert!(parse_date("03/01/2026").is_err());
    }
}
