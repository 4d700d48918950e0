use crate::domain::document::{self, RankingDocument};
use crate::domain::ranking::DailyRanking;
use crate::domain::Locale;
use crate::llm::error::{LlmDiagnosticsError, LlmStage};
use crate::llm::{GenerateInput, HoroscopeModel};
use crate::store::RankingStore;
use crate::time::kst;
use chrono::NaiveDate;
use std::fmt;

/// Days of history consulted for the novelty constraints.
const HISTORY_DAYS: u32 = 7;

#[derive(Debug, Clone)]
pub enum GenerationError {
    /// The generative service failed at the transport level or reported an
    /// error itself.
    Upstream {
        detail: String,
        raw_response: Option<serde_json::Value>,
    },
    /// The service answered but its payload violated the ranking contract.
    MalformedUpstreamResponse {
        detail: String,
        raw_response: Option<serde_json::Value>,
    },
    StoreWrite { detail: String },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Upstream { detail, .. } => write!(f, "upstream error: {detail}"),
            GenerationError::MalformedUpstreamResponse { detail, .. } => {
                write!(f, "malformed upstream response: {detail}")
            }
            GenerationError::StoreWrite { detail } => write!(f, "store write error: {detail}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl GenerationError {
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::Upstream { .. } => "upstream_error",
            GenerationError::MalformedUpstreamResponse { .. } => "malformed_upstream_response",
            GenerationError::StoreWrite { .. } => "store_write_error",
        }
    }

    /// Raw service response, when one was captured, for the run ledger.
    pub fn raw_response(&self) -> Option<&serde_json::Value> {
        match self {
            GenerationError::Upstream { raw_response, .. }
            | GenerationError::MalformedUpstreamResponse { raw_response, .. } => {
                raw_response.as_ref()
            }
            GenerationError::StoreWrite { .. } => None,
        }
    }
}

/// Generate one day's ranking and store it, overwriting any earlier row for
/// the same date. Returns the number of entries stored. Nothing is written
/// on any failure.
pub async fn run(
    store: &dyn RankingStore,
    model: &dyn HoroscopeModel,
    date: NaiveDate,
) -> Result<usize, GenerationError> {
    let history = load_history(store, date).await;
    tracing::info!(%date, history_days = history.len(), "starting generation run");

    let input = GenerateInput {
        date,
        weekday_label: kst::weekday_label(date),
        history,
    };

    let entries = model
        .generate_ranking(&input)
        .await
        .map_err(classify_model_error)?;

    let doc = document::wrapped(&entries);
    store
        .upsert_document(Locale::Ko, date, &doc)
        .await
        .map_err(|e| GenerationError::StoreWrite {
            detail: format!("{e:#}"),
        })?;

    tracing::info!(%date, stored = entries.len(), "generation run stored ranking");
    Ok(entries.len())
}

/// Best-effort history read. A store that cannot serve history does not
/// block generation; the run just proceeds without novelty constraints.
async fn load_history(store: &dyn RankingStore, date: NaiveDate) -> Vec<DailyRanking> {
    match store
        .fetch_recent_documents(Locale::Ko, date, HISTORY_DAYS)
        .await
    {
        Ok(docs) => docs
            .into_iter()
            .filter_map(|(d, v)| {
                RankingDocument::from_value(&v).map(|doc| DailyRanking {
                    date: d,
                    entries: doc.normalize(),
                })
            })
            .collect(),
        Err(err) => {
            tracing::warn!(%date, error = %format!("{err:#}"), "history read failed; generating without novelty constraints");
            Vec::new()
        }
    }
}

fn classify_model_error(err: anyhow::Error) -> GenerationError {
    let detail = format!("{err:#}");
    match err.downcast_ref::<LlmDiagnosticsError>() {
        Some(diag) => {
            let raw_response = diag.raw_response_json.clone().or_else(|| {
                diag.raw_output
                    .as_deref()
                    .map(|raw| serde_json::json!({ "raw_text": raw }))
            });
            match diag.stage {
                LlmStage::Http => GenerationError::Upstream {
                    detail,
                    raw_response,
                },
                LlmStage::Decode | LlmStage::Parse => GenerationError::MalformedUpstreamResponse {
                    detail,
                    raw_response,
                },
            }
        }
        None => GenerationError::Upstream {
            detail,
            raw_response: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ranking::RankEntry;
    use crate::domain::zodiac::ALL_SIGNS;
    use crate::llm::{json, Provider};
    use crate::store::memory::MemoryRankingStore;
    use serde_json::json;
    use std::sync::Mutex;

    /// Plays back a canned response through the same parse path the real
    /// client uses, recording what the prompt input contained.
    struct ScriptedModel {
        response_text: Mutex<String>,
        seen_history_len: Mutex<Option<usize>>,
        http_error: bool,
    }

    impl ScriptedModel {
        fn replying(text: String) -> Self {
            Self {
                response_text: Mutex::new(text),
                seen_history_len: Mutex::new(None),
                http_error: false,
            }
        }

        fn failing_transport() -> Self {
            Self {
                response_text: Mutex::new(String::new()),
                seen_history_len: Mutex::new(None),
                http_error: true,
            }
        }

        fn set_reply(&self, text: String) {
            *self.response_text.lock().unwrap() = text;
        }
    }

    #[async_trait::async_trait]
    impl HoroscopeModel for ScriptedModel {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn generate_ranking(
            &self,
            input: &GenerateInput,
        ) -> anyhow::Result<Vec<RankEntry>> {
            *self.seen_history_len.lock().unwrap() = Some(input.history.len());
            if self.http_error {
                return Err(LlmDiagnosticsError {
                    provider: Provider::OpenAi,
                    stage: LlmStage::Http,
                    detail: "status=500".to_string(),
                    raw_output: None,
                    raw_response_json: None,
                }
                .into());
            }
            let text = self.response_text.lock().unwrap().clone();
            json::parse_ranking(&text).map_err(|e| {
                LlmDiagnosticsError {
                    provider: Provider::OpenAi,
                    stage: LlmStage::Parse,
                    detail: format!("{e:#}"),
                    raw_output: Some(text),
                    raw_response_json: None,
                }
                .into()
            })
        }
    }

    fn ranking_json(content: &str, take: usize) -> String {
        let ranking: Vec<_> = ALL_SIGNS
            .iter()
            .take(take)
            .enumerate()
            .map(|(i, sign)| {
                json!({
                    "rank": i + 1,
                    "sign": sign.label_ko(),
                    "content": content,
                    "lucky_item": "연필",
                    "lucky_color": "민트",
                })
            })
            .collect();
        json!({ "ranking": ranking }).to_string()
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn stores_twelve_entries_on_success() {
        let store = MemoryRankingStore::new();
        let model = ScriptedModel::replying(ranking_json("첫 번째 운세", 12));
        let stored = run(&store, &model, d("2025-06-01")).await.unwrap();
        assert_eq!(stored, 12);

        let doc = store.get(Locale::Ko, d("2025-06-01")).unwrap();
        let ranking = doc.get("ranking").and_then(|v| v.as_array()).unwrap();
        assert_eq!(ranking.len(), 12);
    }

    #[tokio::test]
    async fn rerun_overwrites_the_same_row() {
        let store = MemoryRankingStore::new();
        let model = ScriptedModel::replying(ranking_json("월요일 운세", 12));
        run(&store, &model, d("2025-06-01")).await.unwrap();

        model.set_reply(ranking_json("다시 생성한 운세", 12));
        run(&store, &model, d("2025-06-01")).await.unwrap();

        assert_eq!(store.row_count(), 1);
        let doc = store.get(Locale::Ko, d("2025-06-01")).unwrap();
        assert!(doc.to_string().contains("다시 생성한 운세"));
        assert!(!doc.to_string().contains("월요일 운세"));
    }

    #[tokio::test]
    async fn eleven_entries_fail_as_malformed_without_writing() {
        let store = MemoryRankingStore::new();
        let model = ScriptedModel::replying(ranking_json("운세", 11));
        let err = run(&store, &model, d("2025-06-01")).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::MalformedUpstreamResponse { .. }
        ));
        assert!(err.raw_response().is_some());
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn transport_failure_classifies_as_upstream() {
        let store = MemoryRankingStore::new();
        let model = ScriptedModel::failing_transport();
        let err = run(&store, &model, d("2025-06-01")).await.unwrap_err();
        assert!(matches!(err, GenerationError::Upstream { .. }));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn store_write_failure_is_classified() {
        let store = MemoryRankingStore::new();
        store.fail_writes("disk full");
        let model = ScriptedModel::replying(ranking_json("운세", 12));
        let err = run(&store, &model, d("2025-06-01")).await.unwrap_err();
        assert!(matches!(err, GenerationError::StoreWrite { .. }));
    }

    #[tokio::test]
    async fn history_is_passed_to_the_model() {
        let store = MemoryRankingStore::new();
        store.insert(
            Locale::Ko,
            d("2025-05-31"),
            serde_json::from_str(&ranking_json("어제 운세", 12)).unwrap(),
        );
        let model = ScriptedModel::replying(ranking_json("오늘 운세", 12));
        run(&store, &model, d("2025-06-01")).await.unwrap();
        assert_eq!(*model.seen_history_len.lock().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn unreadable_history_is_tolerated() {
        let store = MemoryRankingStore::new();
        store.fail_reads("history table offline");
        let model = ScriptedModel::replying(ranking_json("오늘 운세", 12));
        let stored = run(&store, &model, d("2025-06-01")).await.unwrap();
        assert_eq!(stored, 12);
        assert_eq!(*model.seen_history_len.lock().unwrap(), Some(0));
    }
}
