use chrono::{DateTime, Days, NaiveDate, Utc};

pub const DEFAULT_LOOKBACK_DAYS: u64 = 365;

/// Resolves optional `YYYY-MM-DD` bounds. Missing end is today (UTC); missing start is
/// one year before the end.
pub fn resolve_date_range(
    start_arg: Option<&str>,
    end_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let end = match end_arg {
        Some(s) => parse_date(s)?,
        None => now_utc.date_naive(),
    };

    let start = match start_arg {
        Some(s) => parse_date(s)?,
        None => end
            .checked_sub_days(Days::new(DEFAULT_LOOKBACK_DAYS))
            .ok_or_else(|| anyhow::anyhow!("end date {end} too early for default lookback"))?,
    };

    anyhow::ensure!(start <= end, "start date {start} is after end date {end}");
    Ok((start, end))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date {s:?} (expected YYYY-MM-DD): {e}"))
}
