use anyhow::Context;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc, Weekday};

const KST_OFFSET_SECS: i32 = 9 * 3600;

fn kst() -> anyhow::Result<FixedOffset> {
    FixedOffset::east_opt(KST_OFFSET_SECS).context("invalid KST offset")
}

/// Calendar date in KST for the given instant. The service pins every date
/// key to KST regardless of where the caller runs.
pub fn service_date(now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    Ok(now_utc.with_timezone(&kst()?).date_naive())
}

/// Canonical "YYYY-MM-DD" key. Lexicographic order of keys equals
/// chronological order of days.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date key: {s}"))
}

/// Resolve an explicit --date argument, falling back to today's KST date.
pub fn resolve_service_date(
    date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    match date_arg {
        Some(s) => parse_date_key(s),
        None => service_date(now_utc),
    }
}

/// Korean weekday name, substituted into the generation prompt.
pub fn weekday_label(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Sun => "일요일",
        Weekday::Mon => "월요일",
        Weekday::Tue => "화요일",
        Weekday::Wed => "수요일",
        Weekday::Thu => "목요일",
        Weekday::Fri => "금요일",
        Weekday::Sat => "토요일",
    }
}
