use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use std::collections::HashSet;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 1800;

// If the job runs before this time (IST), treat it as "yesterday's" market date.
// NSE/BSE close at 15:30 IST; we use a slightly conservative cutoff.
const CLOSE_CUTOFF_HOUR_IST: u32 = 16;
const CLOSE_CUTOFF_MINUTE_IST: u32 = 0;

pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?);
    }

    let ist = chrono::FixedOffset::east_opt(IST_OFFSET_SECS).context("invalid IST offset")?;
    let now_ist = now_utc.with_timezone(&ist);

    let cutoff_reached =
        (now_ist.hour(), now_ist.minute()) >= (CLOSE_CUTOFF_HOUR_IST, CLOSE_CUTOFF_MINUTE_IST);
    let mut date = now_ist.date_naive();
    if !cutoff_reached {
        date = date - Duration::days(1);
    }

    // Roll back to previous trading day.
    let holidays = configured_holidays();
    while is_weekend(date) || holidays.contains(&date) {
        date = date - Duration::days(1);
    }

    Ok(date)
}


fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn configured_holidays() -> HashSet<NaiveDate> {
    // Fixed-date national holidays only; the moveable ones (Holi, Diwali)
    // come in via IN_MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD".
    let mut out = HashSet::new();
    let years = [2024, 2025, 2026, 2027, 2028, 2029, 2030];
    for y in years {
        for (m, d) in [(1, 1), (1, 26), (8, 15), (10, 2), (12, 25)] {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                out.insert(date);
            }
        }
    }

    if let Ok(s) = std::env::var("IN_MARKET_HOLIDAYS") {
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
