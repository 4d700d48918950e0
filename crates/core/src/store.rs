use crate::domain::ranking::RankEntry;
use crate::domain::Locale;
use chrono::NaiveDate;
use serde_json::Value;

/// One row per (locale, date). Writes are overwrite-by-key, so every job
/// built on top of this is idempotent and safe to re-run.
#[async_trait::async_trait]
pub trait RankingStore: Send + Sync {
    /// Point read of the raw stored document for one day.
    async fn fetch_document(
        &self,
        locale: Locale,
        date: NaiveDate,
    ) -> anyhow::Result<Option<Value>>;

    async fn upsert_document(
        &self,
        locale: Locale,
        date: NaiveDate,
        data: &Value,
    ) -> anyhow::Result<()>;

    /// Documents for the `days` dates strictly before `end`, newest first.
    /// Missing days are simply absent from the result.
    async fn fetch_recent_documents(
        &self,
        locale: Locale,
        end: NaiveDate,
        days: u32,
    ) -> anyhow::Result<Vec<(NaiveDate, Value)>>;
}

/// Side channel feeding the home-screen widget. A failure here must never
/// surface to the user; callers log and move on.
#[async_trait::async_trait]
pub trait WidgetSnapshotStore: Send + Sync {
    async fn save_pinned(&self, date: NaiveDate, entry: &RankEntry) -> anyhow::Result<()>;
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use anyhow::bail;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct MemoryRankingStore {
        docs: Mutex<HashMap<(Locale, NaiveDate), Value>>,
        read_delay: Mutex<Option<Duration>>,
        read_error: Mutex<Option<String>>,
        write_error: Mutex<Option<String>>,
        reads: std::sync::atomic::AtomicUsize,
    }

    impl MemoryRankingStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, locale: Locale, date: NaiveDate, data: Value) {
            self.docs.lock().unwrap().insert((locale, date), data);
        }

        pub fn get(&self, locale: Locale, date: NaiveDate) -> Option<Value> {
            self.docs.lock().unwrap().get(&(locale, date)).cloned()
        }

        pub fn row_count(&self) -> usize {
            self.docs.lock().unwrap().len()
        }

        pub fn delay_reads(&self, delay: Duration) {
            *self.read_delay.lock().unwrap() = Some(delay);
        }

        pub fn fail_reads(&self, message: &str) {
            *self.read_error.lock().unwrap() = Some(message.to_string());
        }

        pub fn fail_writes(&self, message: &str) {
            *self.write_error.lock().unwrap() = Some(message.to_string());
        }

        pub fn read_count(&self) -> usize {
            self.reads.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl RankingStore for MemoryRankingStore {
        async fn fetch_document(
            &self,
            locale: Locale,
            date: NaiveDate,
        ) -> anyhow::Result<Option<Value>> {
            self.reads
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let delay = *self.read_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(msg) = self.read_error.lock().unwrap().clone() {
                bail!("{msg}");
            }
            Ok(self.get(locale, date))
        }

        async fn upsert_document(
            &self,
            locale: Locale,
            date: NaiveDate,
            data: &Value,
        ) -> anyhow::Result<()> {
            if let Some(msg) = self.write_error.lock().unwrap().clone() {
                bail!("{msg}");
            }
            self.insert(locale, date, data.clone());
            Ok(())
        }

        async fn fetch_recent_documents(
            &self,
            locale: Locale,
            end: NaiveDate,
            days: u32,
        ) -> anyhow::Result<Vec<(NaiveDate, Value)>> {
            if let Some(msg) = self.read_error.lock().unwrap().clone() {
                bail!("{msg}");
            }
            let docs = self.docs.lock().unwrap();
            let mut out = Vec::new();
            for back in 1..=days as i64 {
                let date = end - chrono::Duration::days(back);
                if let Some(doc) = docs.get(&(locale, date)) {
                    out.push((date, doc.clone()));
                }
            }
            Ok(out)
        }
    }

    #[derive(Default)]
    pub struct MemoryWidgetStore {
        pinned: Mutex<Vec<(NaiveDate, RankEntry)>>,
        fail: Mutex<bool>,
    }

    impl MemoryWidgetStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_writes(&self) {
            *self.fail.lock().unwrap() = true;
        }

        pub fn pinned(&self) -> Vec<(NaiveDate, RankEntry)> {
            self.pinned.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl WidgetSnapshotStore for MemoryWidgetStore {
        async fn save_pinned(&self, date: NaiveDate, entry: &RankEntry) -> anyhow::Result<()> {
            if *self.fail.lock().unwrap() {
                bail!("widget store unavailable");
            }
            self.pinned.lock().unwrap().push((date, entry.clone()));
            Ok(())
        }
    }
}
