use crate::domain::ranking::RankEntry;
use anyhow::Context;
use chrono::NaiveDate;

pub async fn save_pinned(
    pool: &sqlx::PgPool,
    date: NaiveDate,
    entry: &RankEntry,
) -> anyhow::Result<()> {
    let data = serde_json::to_value(entry).context("serialize pinned entry failed")?;

    sqlx::query(
        "INSERT INTO pinned_horoscopes (date, sign, data, updated_at) \
         VALUES ($1, $2, $3, now()) \
         ON CONFLICT (date) DO UPDATE \
           SET sign = EXCLUDED.sign, data = EXCLUDED.data, updated_at = now()",
    )
    .bind(date)
    .bind(&entry.sign)
    .bind(data)
    .execute(pool)
    .await
    .context("upsert pinned_horoscopes failed")?;

    Ok(())
}
