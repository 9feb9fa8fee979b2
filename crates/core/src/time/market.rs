use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use std::collections::HashSet;

// US equities close at 16:00 New York time, which is 20:00 or 21:00 UTC depending on DST.
// Using the later one keeps the date conservative all year.
const CLOSE_CUTOFF_HOUR_UTC: u32 = 21;
const CLOSE_CUTOFF_MINUTE_UTC: u32 = 0;

/// Date whose closing data a run should use.
///
/// An explicit `YYYY-MM-DD` argument wins. Otherwise runs before the close cutoff use the
/// previous day, then roll back over weekends and holidays.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return Ok(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?);
    }

    let cutoff_reached =
        (now_utc.hour(), now_utc.minute()) >= (CLOSE_CUTOFF_HOUR_UTC, CLOSE_CUTOFF_MINUTE_UTC);
    let mut date = now_utc.date_naive();
    if !cutoff_reached {
        date = date - Duration::days(1);
    }

    let holidays = configured_holidays(now_utc.year());
    while is_weekend(date) || holidays.contains(&date) {
        date = date - Duration::days(1);
    }

    Ok(date)
}

/// As-of date for a run that fetches current quotes.
///
/// Quotes are always today's, so an explicit date before the latest closed session would label
/// current valuations with a past date. Those are rejected.
pub fn resolve_live_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    let latest = resolve_as_of_date(None, now_utc)?;
    let Some(s) = as_of_date_arg else {
        return Ok(latest);
    };

    let requested = resolve_as_of_date(Some(s), now_utc)?;
    anyhow::ensure!(
        requested >= latest,
        "as_of_date {requested} is before the latest market date {latest}; \
         past dates are only supported for records files"
    );
    Ok(requested)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn configured_holidays(year: i32) -> HashSet<NaiveDate> {
    // Fixed-date holidays only. Extend via MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD".
    let mut out = HashSet::new();
    for y in (year - 1)..=(year + 1) {
        if let Some(d) = NaiveDate::from_ymd_opt(y, 1, 1) {
            out.insert(d);
        }
        if let Some(d) = NaiveDate::from_ymd_opt(y, 12, 25) {
            out.insert(d);
        }
    }

    if let Ok(s) = std::env::var("MARKET_HOLIDAYS") {
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Ok(d) = NaiveDate::parse_from_str(part, "%Y-%m-%d") {
                out.insert(d);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 8, 0, 0).unwrap();
        let d = resolve_as_of_date(Some("2025-07-15"), now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 7, 15).unwrap());
        assert!(resolve_as_of_date(Some("07/15/2025"), now).is_err());
    }

    #[test]
    fn rolls_back_on_weekend() {
        // 2026-01-10 is Saturday, after cutoff.
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 22, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 9).unwrap());
    }

    #[test]
    fn uses_previous_day_before_cutoff() {
        // Monday 2026-01-12 15:00 UTC is before the close.
        let now = Utc.with_ymd_and_hms(2026, 1, 12, 15, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 9).unwrap());
    }

    #[test]
    fn uses_same_day_after_cutoff() {
        let now = Utc.with_ymd_and_hms(2026, 1, 12, 21, 30, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 12).unwrap());
    }

    #[test]
    fn skips_fixed_holidays() {
        // 2026-12-25 is a Friday.
        let now = Utc.with_ymd_and_hms(2026, 12, 25, 22, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 12, 24).unwrap());
    }

    #[test]
    fn skips_fixed_holidays_in_later_years() {
        // 2036-01-01 is a Tuesday; rolls back over it to Monday 2035-12-31.
        let now = Utc.with_ymd_and_hms(2036, 1, 1, 22, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2035, 12, 31).unwrap());

        // 2040-12-25 is a Tuesday.
        let now = Utc.with_ymd_and_hms(2040, 12, 25, 22, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2040, 12, 24).unwrap());
    }

    #[test]
    fn live_runs_reject_past_dates() {
        let now = Utc.with_ymd_and_hms(2026, 1, 12, 21, 30, 0).unwrap();
        assert!(resolve_live_as_of_date(Some("2020-01-02"), now).is_err());
        assert!(resolve_live_as_of_date(Some("2026-01-09"), now).is_err());
        assert_eq!(
            resolve_live_as_of_date(Some("2026-01-12"), now).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 12).unwrap()
        );
        assert_eq!(
            resolve_live_as_of_date(None, now).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 12).unwrap()
        );
        assert!(resolve_live_as_of_date(Some("not-a-date"), now).is_err());
    }
}
