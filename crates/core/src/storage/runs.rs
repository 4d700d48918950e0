use anyhow::Context;
use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

/// Append one row per job invocation, success or classified failure, for
/// post-mortems. Raw upstream responses are kept when available.
pub async fn record_run(
    pool: &sqlx::PgPool,
    job: &str,
    date: NaiveDate,
    provider: &str,
    status: &str,
    error: Option<&str>,
    raw_response: Option<Value>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO horoscope_runs (id, job, date, provider, status, error, raw_response) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .persistent(false)
    .bind(id)
    .bind(job)
    .bind(date)
    .bind(provider)
    .bind(status)
    .bind(error)
    .bind(raw_response)
    .execute(pool)
    .await
    .context("insert horoscope_runs failed")?;

    Ok(id)
}
