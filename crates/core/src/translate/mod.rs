pub mod deepl;

/// Batch text translation with a fixed language pair. Implementations must
/// return exactly one segment per input, in input order; anything else is an
/// error at this boundary.
#[async_trait::async_trait]
pub trait TranslationClient: Send + Sync {
    fn service_name(&self) -> &'static str;

    async fn translate_batch(&self, texts: &[String]) -> anyhow::Result<Vec<String>>;
}
