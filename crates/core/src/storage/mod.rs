pub mod lock;
pub mod rankings;
pub mod runs;
pub mod widget;

use crate::domain::ranking::RankEntry;
use crate::domain::Locale;
use crate::store::{RankingStore, WidgetSnapshotStore};
use anyhow::Context;
use chrono::NaiveDate;
use serde_json::Value;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// `RankingStore` backed by Postgres, one table per locale.
#[derive(Debug, Clone)]
pub struct PgRankingStore {
    pool: sqlx::PgPool,
}

impl PgRankingStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RankingStore for PgRankingStore {
    async fn fetch_document(
        &self,
        locale: Locale,
        date: NaiveDate,
    ) -> anyhow::Result<Option<Value>> {
        rankings::fetch_document(&self.pool, locale, date).await
    }

    async fn upsert_document(
        &self,
        locale: Locale,
        date: NaiveDate,
        data: &Value,
    ) -> anyhow::Result<()> {
        rankings::upsert_document(&self.pool, locale, date, data).await
    }

    async fn fetch_recent_documents(
        &self,
        locale: Locale,
        end: NaiveDate,
        days: u32,
    ) -> anyhow::Result<Vec<(NaiveDate, Value)>> {
        rankings::fetch_recent_documents(&self.pool, locale, end, days).await
    }
}

#[derive(Debug, Clone)]
pub struct PgWidgetStore {
    pool: sqlx::PgPool,
}

impl PgWidgetStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl WidgetSnapshotStore for PgWidgetStore {
    async fn save_pinned(&self, date: NaiveDate, entry: &RankEntry) -> anyhow::Result<()> {
        widget::save_pinned(&self.pool, date, entry).await
    }
}
