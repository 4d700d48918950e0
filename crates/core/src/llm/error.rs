use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Where in the call an LLM failure happened. Callers branch on this enum
/// to classify a run's outcome; the free-text detail is for logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmStage {
    /// Transport failure or non-2xx status from the service.
    Http,
    /// 2xx response whose envelope did not decode.
    Decode,
    /// Envelope decoded but the payload failed the ranking contract.
    Parse,
}

#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: LlmStage,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={}, stage={:?}): {}",
            self.provider.as_str(),
            self.stage,
            self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}
