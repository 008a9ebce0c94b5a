//! LLM-backed article services: analysis, summary and daily briefing.
//!
//! All three share one failure policy:
//!
//! - missing or unusable input is rejected before any network call
//!   ([`InsightError::InvalidInput`])
//! - a failed completion call is an error ([`InsightError::Model`])
//! - model text that does not decode as the expected record yields that
//!   record's placeholder, flagged with `placeholder: true`

mod analysis;
mod briefing;
mod summary;

pub use analysis::{analyze, Analysis, MAX_ANALYSIS_CHARS};
pub use briefing::{brief, headline_lines, Briefing, BriefingArticle, DEFAULT_BRIEFING_ARTICLES};
pub use summary::{summarize, Summary, SummaryRequest, MAX_SUMMARY_WORDS, MIN_SUMMARY_CHARS};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::llm::{self, CompletionModel, CompletionRequest, LlmError};

#[derive(Debug, Error)]
pub enum InsightError {
    /// Required input missing or malformed
    #[error("{0}")]
    InvalidInput(String),
    /// The article could not be fetched
    #[error("Article content unavailable: {0}")]
    ContentUnavailable(String),
    /// The article was fetched but holds too little text
    #[error("Not enough article text to summarize ({chars} characters)")]
    InsufficientContent { chars: usize },
    #[error("Model request failed: {0}")]
    Model(#[source] LlmError),
    #[error("Request cancelled")]
    Cancelled,
}

impl From<LlmError> for InsightError {
    fn from(value: LlmError) -> Self {
        match value {
            LlmError::Cancelled => InsightError::Cancelled,
            other => InsightError::Model(other),
        }
    }
}

/// A record the model is asked to produce.
trait ModelRecord: DeserializeOwned {
    /// Used in log events.
    const KIND: &'static str;

    /// Stand-in returned when the model's text does not decode.
    fn placeholder() -> Self;
}

/// Runs one completion and decodes it as `T`, substituting the placeholder
/// on decode failure.
async fn complete_record<T: ModelRecord>(
    model: &dyn CompletionModel,
    prompt: String,
    max_tokens: u32,
    cancel: &CancellationToken,
) -> Result<T, InsightError> {
    let request = CompletionRequest { prompt, max_tokens };
    let raw = model.complete(&request, cancel).await?;

    match llm::decode::<T>(&raw) {
        Ok(record) => Ok(record),
        Err(e) => {
            tracing::warn!(kind = T::KIND, error = %e, "Model output did not decode, using placeholder");
            Ok(T::placeholder())
        }
    }
}
