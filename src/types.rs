use crate::extract::ExtractionResult;
use crate::prompt::Language;
use crate::validate::ValidationOutcome;
use serde::{Deserialize, Serialize};

/// One automation request against the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub auto_send: bool,
    pub max_wait_time_ms: u64,
    pub language: Language,
}

impl GenerationRequest {
    pub fn full_flow(prompt: impl Into<String>, language: Language, max_wait_time_ms: u64) -> Self {
        Self {
            prompt: prompt.into(),
            auto_send: true,
            max_wait_time_ms,
            language,
        }
    }
}

/// Everything a successful full flow produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowOutput {
    pub script_json: String,
    pub script_id: Option<String>,
    pub extraction: ExtractionResult,
    pub validation: ValidationOutcome,
}
