use crate::domain::document::{self, RankingDocument};
use crate::domain::ranking::RankEntry;
use crate::domain::zodiac::Zodiac;
use crate::domain::Locale;
use crate::store::RankingStore;
use crate::translate::TranslationClient;
use chrono::NaiveDate;
use std::fmt;

// content, lucky_item, lucky_color per entry.
const SEGMENTS_PER_ENTRY: usize = 3;

#[derive(Debug, Clone)]
pub enum TranslationError {
    /// No base-locale ranking exists for the date yet. Fail fast; this job
    /// never invents content.
    SourceNotFound,
    /// The base row exists but fits neither stored document shape.
    MalformedSource(String),
    /// Translation service failure (transport or reported error).
    Upstream(String),
    /// The service answered with the wrong segment count.
    MalformedTranslationResponse(String),
    Store(String),
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationError::SourceNotFound => write!(f, "no base ranking for that date"),
            TranslationError::MalformedSource(detail) => {
                write!(f, "malformed base ranking: {detail}")
            }
            TranslationError::Upstream(detail) => write!(f, "translation upstream error: {detail}"),
            TranslationError::MalformedTranslationResponse(detail) => {
                write!(f, "malformed translation response: {detail}")
            }
            TranslationError::Store(detail) => write!(f, "store error: {detail}"),
        }
    }
}

impl std::error::Error for TranslationError {}

impl TranslationError {
    pub fn code(&self) -> &'static str {
        match self {
            TranslationError::SourceNotFound => "source_not_found",
            TranslationError::MalformedSource(_) => "malformed_source",
            TranslationError::Upstream(_) => "upstream_error",
            TranslationError::MalformedTranslationResponse(_) => {
                "malformed_translation_response"
            }
            TranslationError::Store(_) => "store_write_error",
        }
    }
}

/// Translate one day's base ranking into the secondary locale and store it.
/// All free-text fields go through the service in a single batch; signs are
/// mapped through the static label table instead. Any failure aborts the
/// whole date with nothing written, and the job is safe to re-run.
pub async fn run(
    store: &dyn RankingStore,
    translator: &dyn TranslationClient,
    date: NaiveDate,
) -> Result<(), TranslationError> {
    let doc = store
        .fetch_document(Locale::Ko, date)
        .await
        .map_err(|e| TranslationError::Store(format!("{e:#}")))?
        .ok_or(TranslationError::SourceNotFound)?;

    let entries = RankingDocument::from_value(&doc)
        .ok_or_else(|| {
            TranslationError::MalformedSource(format!(
                "payload for {date} fits neither document shape"
            ))
        })?
        .normalize();

    let translated = if entries.is_empty() {
        // A stored-but-empty day translates to an empty day.
        Vec::new()
    } else {
        let mut segments = Vec::with_capacity(entries.len() * SEGMENTS_PER_ENTRY);
        for entry in &entries {
            segments.push(entry.content.clone());
            segments.push(entry.lucky_item.clone());
            segments.push(entry.lucky_color.clone());
        }

        let outputs = translator
            .translate_batch(&segments)
            .await
            .map_err(|e| TranslationError::Upstream(format!("{e:#}")))?;

        if outputs.len() != segments.len() {
            return Err(TranslationError::MalformedTranslationResponse(format!(
                "expected {} segments, got {}",
                segments.len(),
                outputs.len()
            )));
        }

        entries
            .iter()
            .zip(outputs.chunks(SEGMENTS_PER_ENTRY))
            .map(|(entry, chunk)| RankEntry {
                rank: entry.rank,
                sign: translate_sign(&entry.sign),
                content: chunk[0].clone(),
                lucky_item: chunk[1].clone(),
                lucky_color: chunk[2].clone(),
            })
            .collect()
    };

    let out_doc = document::wrapped(&translated);
    store
        .upsert_document(Locale::En, date, &out_doc)
        .await
        .map_err(|e| TranslationError::Store(format!("{e:#}")))?;

    tracing::info!(%date, entries = translated.len(), "stored translated ranking");
    Ok(())
}

/// Signs are a closed set: static lookup, never machine translation. Labels
/// from before the current sign set are passed through untouched.
fn translate_sign(label_ko: &str) -> String {
    match Zodiac::from_label_ko(label_ko) {
        Ok(sign) => sign.label_en().to_string(),
        Err(_) => {
            tracing::warn!(label = label_ko, "unknown sign label; keeping original");
            label_ko.to_string()
        }
    }
}
