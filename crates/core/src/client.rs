use crate::domain::document::RankingDocument;
use crate::domain::ranking::RankEntry;
use crate::domain::zodiac::Zodiac;
use crate::domain::Locale;
use crate::store::{RankingStore, WidgetSnapshotStore};
use crate::time::kst;
use chrono::{NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 1;

/// Classification of a failed fetch, produced at the point of failure.
/// Retry decisions branch on this, never on message text. A missing row is
/// not represented here: it is a successful empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The store read lost the race against the timeout.
    Timeout,
    /// The store reported a transport-level failure.
    Network,
    /// A row exists but its payload fits neither accepted document shape.
    MalformedData,
    /// Client-side setup failure, unrelated to the read itself.
    Internal,
}

impl FetchErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchErrorKind::Timeout | FetchErrorKind::Network)
    }
}

#[derive(Debug, Clone)]
pub struct FetchError {
    kind: FetchErrorKind,
    detail: String,
}

impl FetchError {
    fn new(kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch failed ({:?}): {}", self.kind, self.detail)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
        }
    }
}

impl FetchConfig {
    /// Overrides from the environment, read once at construction.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(secs) = env_u64("FETCH_TIMEOUT_SECS") {
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("FETCH_MAX_RETRIES") {
            cfg.max_retries = n as u32;
        }
        if let Some(secs) = env_u64("FETCH_RETRY_BACKOFF_SECS") {
            cfg.retry_backoff = Duration::from_secs(secs);
        }
        cfg
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok())
}

/// Read path used by the app on every view/refresh. Owns the timeout race,
/// the outcome classification, and the defensive normalization of whatever
/// the store holds.
pub struct HoroscopeClient {
    store: Arc<dyn RankingStore>,
    widget: Option<Arc<dyn WidgetSnapshotStore>>,
    favorite_sign: Option<Zodiac>,
    config: FetchConfig,
}

impl HoroscopeClient {
    pub fn new(store: Arc<dyn RankingStore>, config: FetchConfig) -> Self {
        Self {
            store,
            widget: None,
            favorite_sign: None,
            config,
        }
    }

    /// Enable the widget side channel: after a successful same-day fetch the
    /// favorite sign's entry is pinned for the home-screen widget.
    pub fn with_widget_pin(
        mut self,
        widget: Arc<dyn WidgetSnapshotStore>,
        favorite_sign: Zodiac,
    ) -> Self {
        self.widget = Some(widget);
        self.favorite_sign = Some(favorite_sign);
        self
    }

    /// One read attempt. A missing row resolves to an empty sequence; the
    /// result is sorted by rank and may be shorter than the full sign set.
    pub async fn fetch_ranking(
        &self,
        date: Option<NaiveDate>,
        locale: Locale,
    ) -> Result<Vec<RankEntry>, FetchError> {
        let date = match date {
            Some(d) => d,
            None => kst::service_date(Utc::now())
                .map_err(|e| FetchError::new(FetchErrorKind::Internal, format!("{e:#}")))?,
        };

        let read = tokio::time::timeout(
            self.config.timeout,
            self.store.fetch_document(locale, date),
        )
        .await;

        let doc = match read {
            Err(_elapsed) => {
                return Err(FetchError::new(
                    FetchErrorKind::Timeout,
                    format!("store read exceeded {:?}", self.config.timeout),
                ));
            }
            Ok(Err(e)) => {
                return Err(FetchError::new(FetchErrorKind::Network, format!("{e:#}")));
            }
            Ok(Ok(None)) => return Ok(Vec::new()),
            Ok(Ok(Some(doc))) => doc,
        };

        let entries = RankingDocument::from_value(&doc)
            .ok_or_else(|| {
                FetchError::new(
                    FetchErrorKind::MalformedData,
                    format!("stored payload for {date} fits neither document shape"),
                )
            })?
            .normalize();

        self.pin_favorite(date, locale, &entries).await;

        Ok(entries)
    }

    /// Caller-level retry wrapper: up to `max_retries` extra attempts with a
    /// fixed backoff, only for transient kinds. Everything else surfaces
    /// immediately.
    pub async fn fetch_ranking_with_retry(
        &self,
        date: Option<NaiveDate>,
        locale: Locale,
    ) -> Result<Vec<RankEntry>, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            match self.fetch_ranking(date, locale).await {
                Ok(entries) => return Ok(entries),
                Err(err) => {
                    if !err.kind().is_transient() || attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        kind = ?err.kind(),
                        error = %err,
                        "transient fetch failure; retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
            }
        }
    }

    async fn pin_favorite(&self, date: NaiveDate, locale: Locale, entries: &[RankEntry]) {
        if locale != Locale::Ko {
            return;
        }
        let (Some(widget), Some(favorite)) = (&self.widget, self.favorite_sign) else {
            return;
        };
        let Ok(today) = kst::service_date(Utc::now()) else {
            return;
        };
        if date != today {
            return;
        }
        let Some(entry) = entries.iter().find(|e| e.sign == favorite.label_ko()) else {
            return;
        };

        if let Err(err) = widget.save_pinned(date, entry).await {
            // Side channel only: never fails the fetch.
            tracing::warn!(%date, error = %format!("{err:#}"), "widget pin write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryRankingStore, MemoryWidgetStore};
    use serde_json::json;

    fn entry(rank: serde_json::Value, sign: &str) -> serde_json::Value {
        json!({
            "rank": rank,
            "sign": sign,
            "content": "내용",
            "lucky_item": "연필",
            "lucky_color": "민트",
        })
    }

    fn quick_config() -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_millis(20),
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn missing_day_is_an_empty_sequence() {
        let store = Arc::new(MemoryRankingStore::new());
        let client = HoroscopeClient::new(store, quick_config());
        let entries = client
            .fetch_ranking(Some(d("2025-06-01")), Locale::Ko)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn entries_come_back_sorted_regardless_of_storage_order() {
        let store = Arc::new(MemoryRankingStore::new());
        store.insert(
            Locale::Ko,
            d("2025-06-01"),
            json!({ "ranking": [entry(json!(2), "사자자리"), entry(json!(1), "양자리")] }),
        );
        let client = HoroscopeClient::new(store, quick_config());
        let entries = client
            .fetch_ranking(Some(d("2025-06-01")), Locale::Ko)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].rank, entries[0].sign.as_str()), (1, "양자리"));
        assert_eq!((entries[1].rank, entries[1].sign.as_str()), (2, "사자자리"));
    }

    #[tokio::test]
    async fn non_numeric_ranks_are_filtered_out() {
        let store = Arc::new(MemoryRankingStore::new());
        store.insert(
            Locale::Ko,
            d("2025-06-01"),
            json!([entry(json!("첫째"), "게자리"), entry(json!(3), "물병자리")]),
        );
        let client = HoroscopeClient::new(store, quick_config());
        let entries = client
            .fetch_ranking(Some(d("2025-06-01")), Locale::Ko)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rank, 3);
    }

    #[tokio::test]
    async fn malformed_payload_is_classified_not_retried() {
        let store = Arc::new(MemoryRankingStore::new());
        store.insert(Locale::Ko, d("2025-06-01"), json!({ "rows": [] }));
        let client = HoroscopeClient::new(store.clone(), quick_config());
        let err = client
            .fetch_ranking_with_retry(Some(d("2025-06-01")), Locale::Ko)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::MalformedData);
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn slow_store_read_classifies_as_timeout() {
        let store = Arc::new(MemoryRankingStore::new());
        store.insert(
            Locale::Ko,
            d("2025-06-01"),
            json!({ "ranking": [entry(json!(1), "양자리")] }),
        );
        store.delay_reads(Duration::from_millis(200));
        let client = HoroscopeClient::new(store, quick_config());
        let err = client
            .fetch_ranking(Some(d("2025-06-01")), Locale::Ko)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Timeout);
        assert!(err.kind().is_transient());
    }

    #[tokio::test]
    async fn transient_failures_retry_up_to_the_limit() {
        let store = Arc::new(MemoryRankingStore::new());
        store.fail_reads("connection reset");
        let client = HoroscopeClient::new(store.clone(), quick_config());
        let err = client
            .fetch_ranking_with_retry(Some(d("2025-06-01")), Locale::Ko)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Network);
        // Initial attempt plus two retries.
        assert_eq!(store.read_count(), 3);
    }

    #[tokio::test]
    async fn locale_selects_the_variant_table() {
        let store = Arc::new(MemoryRankingStore::new());
        store.insert(
            Locale::En,
            d("2025-06-01"),
            json!({ "ranking": [entry(json!(1), "Aries")] }),
        );
        let client = HoroscopeClient::new(store, quick_config());
        let ko = client
            .fetch_ranking(Some(d("2025-06-01")), Locale::Ko)
            .await
            .unwrap();
        assert!(ko.is_empty());
        let en = client
            .fetch_ranking(Some(d("2025-06-01")), Locale::En)
            .await
            .unwrap();
        assert_eq!(en.len(), 1);
    }

    #[tokio::test]
    async fn same_day_fetch_pins_the_favorite_sign() {
        let today = kst::service_date(Utc::now()).unwrap();
        let store = Arc::new(MemoryRankingStore::new());
        store.insert(
            Locale::Ko,
            today,
            json!({ "ranking": [entry(json!(1), "사자자리"), entry(json!(2), "양자리")] }),
        );
        let widget = Arc::new(MemoryWidgetStore::new());
        let client = HoroscopeClient::new(store, quick_config())
            .with_widget_pin(widget.clone(), Zodiac::Leo);
        let entries = client.fetch_ranking(None, Locale::Ko).await.unwrap();
        assert_eq!(entries.len(), 2);
        let pinned = widget.pinned();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].1.sign, "사자자리");
    }

    #[tokio::test]
    async fn widget_pin_failure_never_fails_the_fetch() {
        let today = kst::service_date(Utc::now()).unwrap();
        let store = Arc::new(MemoryRankingStore::new());
        store.insert(
            Locale::Ko,
            today,
            json!({ "ranking": [entry(json!(1), "사자자리")] }),
        );
        let widget = Arc::new(MemoryWidgetStore::new());
        widget.fail_writes();
        let client = HoroscopeClient::new(store, quick_config())
            .with_widget_pin(widget, Zodiac::Leo);
        let entries = client.fetch_ranking(None, Locale::Ko).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn past_date_fetch_does_not_pin() {
        let store = Arc::new(MemoryRankingStore::new());
        store.insert(
            Locale::Ko,
            d("2025-06-01"),
            json!({ "ranking": [entry(json!(1), "사자자리")] }),
        );
        let widget = Arc::new(MemoryWidgetStore::new());
        let client = HoroscopeClient::new(store, quick_config())
            .with_widget_pin(widget.clone(), Zodiac::Leo);
        client
            .fetch_ranking(Some(d("2025-06-01")), Locale::Ko)
            .await
            .unwrap();
        assert!(widget.pinned().is_empty());
    }
}
