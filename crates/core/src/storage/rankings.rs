use crate::domain::Locale;
use anyhow::Context;
use chrono::{Duration, NaiveDate};
use serde_json::Value;

fn table(locale: Locale) -> &'static str {
    match locale {
        Locale::Ko => "daily_horoscopes",
        Locale::En => "daily_horoscopes_en",
    }
}

pub async fn fetch_document(
    pool: &sqlx::PgPool,
    locale: Locale,
    date: NaiveDate,
) -> anyhow::Result<Option<Value>> {
    let row: Option<(Value,)> = sqlx::query_as(&format!(
        "SELECT data FROM {} WHERE date = $1",
        table(locale)
    ))
    .bind(date)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("select {} failed", table(locale)))?;

    Ok(row.map(|(data,)| data))
}

/// Overwrite-by-date upsert; re-running a job for the same date is safe.
pub async fn upsert_document(
    pool: &sqlx::PgPool,
    locale: Locale,
    date: NaiveDate,
    data: &Value,
) -> anyhow::Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {} (date, data, generated_at) VALUES ($1, $2, now()) \
         ON CONFLICT (date) DO UPDATE SET data = EXCLUDED.data, generated_at = now()",
        table(locale)
    ))
    .bind(date)
    .bind(data)
    .execute(pool)
    .await
    .with_context(|| format!("upsert {} failed", table(locale)))?;

    Ok(())
}

pub async fn fetch_recent_documents(
    pool: &sqlx::PgPool,
    locale: Locale,
    end: NaiveDate,
    days: u32,
) -> anyhow::Result<Vec<(NaiveDate, Value)>> {
    let start = end - Duration::days(days as i64);
    let rows: Vec<(NaiveDate, Value)> = sqlx::query_as(&format!(
        "SELECT date, data FROM {} WHERE date >= $1 AND date < $2 ORDER BY date DESC",
        table(locale)
    ))
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .with_context(|| format!("select recent {} failed", table(locale)))?;

    Ok(rows)
}
