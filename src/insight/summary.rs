use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{complete_record, InsightError, ModelRecord};
use crate::content::{html_to_text, ArticleSource, ContentError};
use crate::llm::{prompts, CompletionModel};
use crate::util::truncate_words;

/// Words of article text sent to the model.
pub const MAX_SUMMARY_WORDS: usize = 6_000;

/// Below this many characters there is nothing worth summarizing.
pub const MIN_SUMMARY_CHARS: usize = 100;

const MAX_OUTPUT_TOKENS: u32 = 1_000;
const DEFAULT_TITLE: &str = "Article";

/// A short structured summary of one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub tldr: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub technical_depth: String,
    #[serde(default)]
    pub worth_reading: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl ModelRecord for Summary {
    const KIND: &'static str = "summary";

    fn placeholder() -> Self {
        Self {
            tldr: "Could not parse AI summary.".to_string(),
            key_points: Vec::new(),
            technical_depth: "Unknown".to_string(),
            worth_reading: "Unable to determine.".to_string(),
            placeholder: true,
        }
    }
}

/// What to summarize: a page URL, caller-supplied text, or both.
///
/// When both are given the page is preferred and `content` is only used if
/// the page cannot be fetched or holds too little text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SummaryRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl SummaryRequest {
    fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Fallback text with markup removed, if any is left.
    fn fallback_text(&self) -> Option<String> {
        self.content
            .as_deref()
            .map(html_to_text)
            .filter(|t| !t.is_empty())
    }
}

/// Gathers article text and asks the model for a [`Summary`].
///
/// # Errors
///
/// - [`InsightError::InvalidInput`] - neither a URL nor content given, or
///   the URL is invalid and no content was given
/// - [`InsightError::ContentUnavailable`] - the page fetch failed and no
///   content was given
/// - [`InsightError::InsufficientContent`] - fewer than
///   [`MIN_SUMMARY_CHARS`] characters of usable text
/// - [`InsightError::Model`] / [`InsightError::Cancelled`]
pub async fn summarize(
    model: &dyn CompletionModel,
    pages: &dyn ArticleSource,
    request: &SummaryRequest,
    cancel: &CancellationToken,
) -> Result<Summary, InsightError> {
    let fallback = request.fallback_text();
    let (title, text) = gather_text(pages, request.url(), fallback, cancel).await?;

    let text = truncate_words(&text, MAX_SUMMARY_WORDS);
    let chars = text.chars().count();
    if chars < MIN_SUMMARY_CHARS {
        return Err(InsightError::InsufficientContent { chars });
    }

    let summary: Summary = complete_record(
        model,
        prompts::summary(&title, &text),
        MAX_OUTPUT_TOKENS,
        cancel,
    )
    .await?;

    tracing::info!(title = %title, placeholder = summary.placeholder, "Summary complete");
    Ok(summary)
}

async fn gather_text(
    pages: &dyn ArticleSource,
    url: Option<&str>,
    fallback: Option<String>,
    cancel: &CancellationToken,
) -> Result<(String, String), InsightError> {
    let Some(url) = url else {
        return fallback
            .map(|text| (DEFAULT_TITLE.to_string(), text))
            .ok_or_else(|| InsightError::InvalidInput("Missing article URL".to_string()));
    };

    match pages.fetch(url, cancel).await {
        Ok(page) if page.text.chars().count() >= MIN_SUMMARY_CHARS => Ok((page.title, page.text)),
        Ok(page) => match fallback {
            Some(text) => {
                tracing::debug!(url = %url, "Extracted text too short, using supplied content");
                Ok((page.title, text))
            }
            None => Err(InsightError::InsufficientContent {
                chars: page.text.chars().count(),
            }),
        },
        Err(ContentError::Cancelled) => Err(InsightError::Cancelled),
        Err(e) => match fallback {
            Some(text) => {
                tracing::warn!(url = %url, error = %e, "Article fetch failed, using supplied content");
                Ok((DEFAULT_TITLE.to_string(), text))
            }
            None => {
                tracing::warn!(url = %url, error = %e, "Article fetch failed");
                Err(match e {
                    ContentError::InvalidUrl(msg) => InsightError::InvalidInput(msg),
                    other => InsightError::ContentUnavailable(other.to_string()),
                })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ExtractedPage;
    use crate::insight::testing::ScriptedModel;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const REPLY: &str = r#"{"tldr": "Short.", "keyPoints": ["a", "b", "c"], "technicalDepth": "Moderate", "worthReading": "Yes."}"#;

    enum FakePages {
        Page(String),
        Status(u16),
        Unused,
    }

    #[async_trait]
    impl ArticleSource for FakePages {
        async fn fetch(
            &self,
            _url: &str,
            _cancel: &CancellationToken,
        ) -> Result<ExtractedPage, ContentError> {
            match self {
                FakePages::Page(text) => Ok(ExtractedPage {
                    title: "Fetched Title".into(),
                    text: text.clone(),
                }),
                FakePages::Status(code) => Err(ContentError::HttpStatus(*code)),
                FakePages::Unused => panic!("page source should not be called"),
            }
        }
    }

    fn long_text(word: &str) -> String {
        vec![word; 60].join(" ")
    }

    fn request(url: Option<&str>, content: Option<&str>) -> SummaryRequest {
        SummaryRequest {
            url: url.map(Into::into),
            content: content.map(Into::into),
        }
    }

    #[tokio::test]
    async fn test_summarize_fetched_page() {
        let model = ScriptedModel::replying(REPLY);
        let pages = FakePages::Page(long_text("page"));

        let summary = summarize(
            &model,
            &pages,
            &request(Some("https://example.com/a"), None),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.tldr, "Short.");
        assert_eq!(summary.key_points, vec!["a", "b", "c"]);
        let prompt = model.last_prompt();
        assert!(prompt.contains("TITLE: Fetched Title"));
        assert!(prompt.contains("page page"));
    }

    #[tokio::test]
    async fn test_404_without_fallback_is_content_unavailable() {
        let model = ScriptedModel::replying(REPLY);
        let result = summarize(
            &model,
            &FakePages::Status(404),
            &request(Some("https://example.com/gone"), None),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(InsightError::ContentUnavailable(_))));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_content() {
        let model = ScriptedModel::replying(REPLY);
        let fallback = format!("<p>{}</p>", long_text("fallback"));

        summarize(
            &model,
            &FakePages::Status(503),
            &request(Some("https://example.com/down"), Some(&fallback)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let prompt = model.last_prompt();
        assert!(prompt.contains("fallback fallback"));
        assert!(!prompt.contains("<p>"));
    }

    #[tokio::test]
    async fn test_short_page_uses_fallback_or_fails() {
        let model = ScriptedModel::replying(REPLY);
        let result = summarize(
            &model,
            &FakePages::Page("tiny".into()),
            &request(Some("https://example.com/short"), None),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(InsightError::InsufficientContent { chars: 4 })
        ));

        let fallback = long_text("backup");
        summarize(
            &model,
            &FakePages::Page("tiny".into()),
            &request(Some("https://example.com/short"), Some(&fallback)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(model.last_prompt().contains("TITLE: Fetched Title"));
        assert!(model.last_prompt().contains("backup"));
    }

    #[tokio::test]
    async fn test_missing_input_rejected() {
        let model = ScriptedModel::replying(REPLY);
        let result = summarize(
            &model,
            &FakePages::Unused,
            &request(Some("   "), None),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(InsightError::InvalidInput(_))));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_content_only_request() {
        let model = ScriptedModel::replying(REPLY);
        let text = long_text("direct");
        summarize(
            &model,
            &FakePages::Unused,
            &request(None, Some(&text)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(model.last_prompt().contains("TITLE: Article"));
    }

    #[tokio::test]
    async fn test_word_budget_applied() {
        let model = ScriptedModel::replying(REPLY);
        let text = format!("{} END", vec!["w"; MAX_SUMMARY_WORDS].join(" "));
        summarize(
            &model,
            &FakePages::Unused,
            &request(None, Some(&text)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let prompt = model.last_prompt();
        assert!(!prompt.contains("END"));
        assert!(prompt.contains("w w..."));
    }

    #[tokio::test]
    async fn test_fenced_curly_reply_decodes() {
        let model = ScriptedModel::replying(
            "```json\n{\u{201C}tldr\u{201D}: \u{201C}Short.\u{201D}, \u{201C}keyPoints\u{201D}: [], \u{201C}technicalDepth\u{201D}: \u{201C}Low\u{201D}, \u{201C}worthReading\u{201D}: \u{201C}No.\u{201D}}\n```",
        );
        let text = long_text("x");
        let summary = summarize(
            &model,
            &FakePages::Unused,
            &request(None, Some(&text)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.tldr, "Short.");
        assert_eq!(summary.technical_depth, "Low");
        assert!(!summary.placeholder);
    }

    #[tokio::test]
    async fn test_garbage_reply_gives_placeholder() {
        let model = ScriptedModel::replying("not json at all");
        let text = long_text("x");
        let summary = summarize(
            &model,
            &FakePages::Unused,
            &request(None, Some(&text)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(summary, Summary::placeholder());
    }
}
