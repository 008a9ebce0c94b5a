use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{complete_record, InsightError, ModelRecord};
use crate::llm::{prompts, CompletionModel};
use crate::util::truncate_chars;

/// Article text beyond this many characters is not sent to the model.
pub const MAX_ANALYSIS_CHARS: usize = 15_000;

const MAX_OUTPUT_TOKENS: u32 = 3_000;

/// An expert take on one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub summary: String,
    pub insight: String,
    #[serde(default)]
    pub technical_context: String,
    #[serde(default)]
    pub takeaways: Vec<String>,
    #[serde(default)]
    pub what_to_watch: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl ModelRecord for Analysis {
    const KIND: &'static str = "analysis";

    fn placeholder() -> Self {
        Self {
            summary: "Could not parse AI summary.".to_string(),
            insight: "Analysis failed.".to_string(),
            technical_context: String::new(),
            takeaways: Vec::new(),
            what_to_watch: String::new(),
            placeholder: true,
        }
    }
}

impl Analysis {
    /// Markdown document for saving or sharing. Empty optional sections are
    /// left out.
    pub fn to_markdown(&self, title: &str) -> String {
        let mut md = format!(
            "# {}\n\n## Summary\n{}\n\n## Key Insight\n{}",
            title, self.summary, self.insight
        );

        if !self.technical_context.trim().is_empty() {
            md.push_str("\n\n## Technical Context\n");
            md.push_str(&self.technical_context);
        }

        md.push_str("\n\n## Practical Takeaways\n");
        let bullets: Vec<String> = self.takeaways.iter().map(|t| format!("- {}", t)).collect();
        md.push_str(&bullets.join("\n"));

        if !self.what_to_watch.trim().is_empty() {
            md.push_str("\n\n## What to Watch\n");
            md.push_str(&self.what_to_watch);
        }

        md.push_str("\n\nGenerated by AI.");
        md
    }
}

/// Asks the model for an [`Analysis`] of raw article text.
///
/// # Errors
///
/// [`InsightError::InvalidInput`] for blank content (no model call),
/// [`InsightError::Model`] or [`InsightError::Cancelled`] from the call.
pub async fn analyze(
    model: &dyn CompletionModel,
    content: &str,
    cancel: &CancellationToken,
) -> Result<Analysis, InsightError> {
    if content.trim().is_empty() {
        return Err(InsightError::InvalidInput(
            "Missing content to analyze".to_string(),
        ));
    }

    let content = truncate_chars(content, MAX_ANALYSIS_CHARS);
    let analysis: Analysis =
        complete_record(model, prompts::analysis(content), MAX_OUTPUT_TOKENS, cancel).await?;

    tracing::info!(
        placeholder = analysis.placeholder,
        takeaways = analysis.takeaways.len(),
        "Analysis complete"
    );
    Ok(analysis)
}
