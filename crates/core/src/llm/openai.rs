use crate::config::Settings;
use crate::domain::ranking::RankEntry;
use crate::llm::error::{LlmDiagnosticsError, LlmStage};
use crate::llm::{json, prompt, GenerateInput, HoroscopeModel, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-5-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

// Repair round-trips after an unparseable response.
const MAX_REPAIR_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
        })
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> anyhow::Result<(serde_json::Value, ChatCompletionResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );

        let req = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            // Structured mode: the service must return a single JSON object.
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .map_err(|e| LlmDiagnosticsError {
                provider: Provider::OpenAi,
                stage: LlmStage::Http,
                detail: format!("request failed: {e}"),
                raw_output: None,
                raw_response_json: None,
            })?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read OpenAI response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAi,
                stage: LlmStage::Http,
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text).map_err(|e| {
            LlmDiagnosticsError {
                provider: Provider::OpenAi,
                stage: LlmStage::Decode,
                detail: format!("response is not JSON: {e}"),
                raw_output: Some(text.clone()),
                raw_response_json: None,
            }
        })?;
        let parsed = serde_json::from_value::<ChatCompletionResponse>(raw_json.clone()).map_err(
            |e| LlmDiagnosticsError {
                provider: Provider::OpenAi,
                stage: LlmStage::Decode,
                detail: format!("unexpected completion envelope: {e}"),
                raw_output: Some(text),
                raw_response_json: Some(raw_json.clone()),
            },
        )?;
        Ok((raw_json, parsed))
    }

    fn response_content(res: &ChatCompletionResponse) -> Result<String, LlmDiagnosticsError> {
        res.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmDiagnosticsError {
                provider: Provider::OpenAi,
                stage: LlmStage::Decode,
                detail: "completion has no message content".to_string(),
                raw_output: None,
                raw_response_json: None,
            })
    }

    async fn try_parse_with_repairs(
        &self,
        system_prompt: &str,
        initial_text: String,
        initial_raw_json: serde_json::Value,
    ) -> anyhow::Result<(Vec<RankEntry>, serde_json::Value)> {
        match json::parse_ranking(&initial_text) {
            Ok(entries) => Ok((entries, initial_raw_json)),
            Err(first_err) => {
                let mut last_err = first_err;
                let mut last_text = initial_text;
                let mut last_raw_json = initial_raw_json;

                for attempt in 1..=MAX_REPAIR_ATTEMPTS {
                    let messages = vec![
                        ChatMessage {
                            role: "system",
                            content: system_prompt.to_string(),
                        },
                        ChatMessage {
                            role: "user",
                            content: prompt::build_repair_prompt(&last_text),
                        },
                    ];

                    let (repair_raw_json, repair_res) = self.chat(messages).await?;
                    let repair_text = Self::response_content(&repair_res)?;
                    match json::parse_ranking(&repair_text) {
                        Ok(entries) => return Ok((entries, repair_raw_json)),
                        Err(err) => {
                            last_err = err;
                            last_text = repair_text;
                            last_raw_json = repair_raw_json;
                            tracing::warn!(
                                attempt,
                                error = %last_err,
                                "model output still invalid after repair attempt"
                            );
                        }
                    }
                }

                Err(LlmDiagnosticsError {
                    provider: Provider::OpenAi,
                    stage: LlmStage::Parse,
                    detail: format!("final_error={last_err}"),
                    raw_output: Some(last_text),
                    raw_response_json: Some(last_raw_json),
                }
                .into())
            }
        }
    }

    pub async fn generate_ranking_with_raw(
        &self,
        input: &GenerateInput,
    ) -> anyhow::Result<(Vec<RankEntry>, serde_json::Value)> {
        let system_prompt = prompt::build_system_prompt(input);
        let messages = vec![ChatMessage {
            role: "system",
            content: system_prompt.clone(),
        }];

        let (raw_json, res) = self.chat(messages).await?;
        let text = Self::response_content(&res)?;
        self.try_parse_with_repairs(&system_prompt, text, raw_json)
            .await
    }
}

#[async_trait::async_trait]
impl HoroscopeModel for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate_ranking(&self, input: &GenerateInput) -> anyhow::Result<Vec<RankEntry>> {
        let (entries, _raw) = self.generate_ranking_with_raw(input).await?;
        Ok(entries)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
