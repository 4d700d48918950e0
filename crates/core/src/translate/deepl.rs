use crate::config::Settings;
use crate::translate::TranslationClient;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api-free.deepl.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const SOURCE_LANG: &str = "KO";
const TARGET_LANG: &str = "EN";

#[derive(Debug, Clone)]
pub struct DeepLClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DeepLClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_deepl_api_key()?.to_string();
        let base_url =
            std::env::var("DEEPL_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("DEEPL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build DeepL http client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }
}

#[async_trait::async_trait]
impl TranslationClient for DeepLClient {
    fn service_name(&self) -> &'static str {
        "deepl"
    }

    async fn translate_batch(&self, texts: &[String]) -> anyhow::Result<Vec<String>> {
        anyhow::ensure!(!texts.is_empty(), "translation batch must be non-empty");

        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("DeepL-Auth-Key {}", self.api_key))?,
        );

        let req = TranslateRequest {
            text: texts,
            source_lang: SOURCE_LANG,
            target_lang: TARGET_LANG,
        };

        let url = format!("{}/v2/translate", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("DeepL request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read DeepL response body")?;
        anyhow::ensure!(status.is_success(), "DeepL HTTP {status}: {text}");

        let parsed = serde_json::from_str::<TranslateResponse>(&text)
            .with_context(|| format!("unexpected DeepL response: {text}"))?;

        anyhow::ensure!(
            parsed.translations.len() == texts.len(),
            "DeepL returned {} segments for {} inputs",
            parsed.translations.len(),
            texts.len()
        );

        Ok(parsed.translations.into_iter().map(|t| t.text).collect())
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a [String],
    source_lang: &'static str,
    target_lang: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}
