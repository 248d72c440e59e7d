use crate::llm::Provider;
use std::fmt;

/// Carried inside `anyhow::Error` so callers can downcast and log the raw
/// model output when a call fails for good.
#[derive(Debug, Clone)]
pub struct LlmCallError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl fmt::Display for LlmCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmCallError {}
