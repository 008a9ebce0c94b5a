use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{complete_record, InsightError, ModelRecord};
use crate::feed::AggregatedArticle;
use crate::llm::{prompts, CompletionModel};
use crate::util::truncate_chars;

/// Stories included in a briefing when not configured otherwise.
pub const DEFAULT_BRIEFING_ARTICLES: usize = 10;

/// Characters of raw content used when an article has no snippet.
const CONTENT_PREVIEW_CHARS: usize = 200;

const MAX_OUTPUT_TOKENS: u32 = 1_200;

/// Morning briefing synthesized from the day's headlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Briefing {
    pub greeting: String,
    pub summary: String,
    pub key_takeaway: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl ModelRecord for Briefing {
    const KIND: &'static str = "briefing";

    fn placeholder() -> Self {
        Self {
            greeting: "Good Morning".to_string(),
            summary: "Here are your top stories for the day.".to_string(),
            key_takeaway: "Stay curious.".to_string(),
            placeholder: true,
        }
    }
}

impl Briefing {
    /// Summary split on blank lines, empty paragraphs dropped.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.summary
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// The parts of an article a briefing looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingArticle {
    pub title: String,
    #[serde(default)]
    pub content_snippet: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl From<&AggregatedArticle> for BriefingArticle {
    fn from(item: &AggregatedArticle) -> Self {
        Self {
            title: item.article.title.clone(),
            content_snippet: item.article.content_snippet.clone(),
            content: item.article.content.clone(),
        }
    }
}

/// Renders the first `max` articles as `- {title}: {preview}` lines.
///
/// The preview is the snippet, or the first 200 characters of content when
/// the snippet is missing or empty.
pub fn headline_lines(articles: &[BriefingArticle], max: usize) -> String {
    articles
        .iter()
        .take(max)
        .map(|a| {
            let preview = a
                .content_snippet
                .as_deref()
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    a.content
                        .as_deref()
                        .map(|c| truncate_chars(c, CONTENT_PREVIEW_CHARS))
                })
                .unwrap_or_default();
            format!("- {}: {}", a.title, preview)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Asks the model for a [`Briefing`] over the top `max_articles` articles.
///
/// Returns `Ok(None)` without calling the model when `articles` is empty.
pub async fn brief(
    model: &dyn CompletionModel,
    articles: &[BriefingArticle],
    max_articles: usize,
    cancel: &CancellationToken,
) -> Result<Option<Briefing>, InsightError> {
    if articles.is_empty() || max_articles == 0 {
        tracing::debug!("No articles to brief");
        return Ok(None);
    }

    let headlines = headline_lines(articles, max_articles);
    let briefing: Briefing = complete_record(
        model,
        prompts::briefing(&headlines),
        MAX_OUTPUT_TOKENS,
        cancel,
    )
    .await?;

    tracing::info!(
        articles = articles.len().min(max_articles),
        placeholder = briefing.placeholder,
        "Briefing complete"
    );
    Ok(Some(briefing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::testing::ScriptedModel;
    use pretty_assertions::assert_eq;

    fn article(title: &str, snippet: Option<&str>, content: Option<&str>) -> BriefingArticle {
        BriefingArticle {
            title: title.into(),
            content_snippet: snippet.map(Into::into),
            content: content.map(Into::into),
        }
    }

    #[test]
    fn test_headline_lines() {
        let long = "c".repeat(300);
        let articles = vec![
            article("One", Some("snippet one"), Some("ignored")),
            article("Two", Some(""), Some(&long)),
            article("Three", None, None),
        ];
        let lines = headline_lines(&articles, 10);
        let expected = format!("- One: snippet one\n- Two: {}\n- Three: ", "c".repeat(200));
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_headline_lines_capped() {
        let articles: Vec<_> = (0..15)
            .map(|i| article(&format!("T{}", i), Some("s"), None))
            .collect();
        let lines = headline_lines(&articles, DEFAULT_BRIEFING_ARTICLES);
        assert_eq!(lines.lines().count(), 10);
        assert!(lines.ends_with("- T9: s"));
    }

    #[tokio::test]
    async fn test_empty_articles_is_noop() {
        let model = ScriptedModel::replying("{}");
        let result = brief(&model, &[], 10, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_brief_decodes_record() {
        let model = ScriptedModel::replying(
            r#"Sure! {"greeting": "Rise and Shine", "summary": "P1.\n\nP2.", "key_takeaway": "Ship it."}"#,
        );
        let briefing = brief(
            &model,
            &[article("A", Some("b"), None)],
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(briefing.greeting, "Rise and Shine");
        assert_eq!(briefing.paragraphs().collect::<Vec<_>>(), vec!["P1.", "P2."]);
        assert!(model.last_prompt().contains("- A: b"));
        assert_eq!(model.requests.lock().unwrap()[0].max_tokens, 1_200);
    }

    #[tokio::test]
    async fn test_bad_reply_gives_default_briefing() {
        let model = ScriptedModel::replying("{\"greeting\": ");
        let briefing = brief(
            &model,
            &[article("A", None, None)],
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(briefing.placeholder);
        assert_eq!(briefing.greeting, "Good Morning");
        assert_eq!(briefing.key_takeaway, "Stay curious.");
    }

    #[test]
    fn test_article_input_shape() {
        let input: BriefingArticle = serde_json::from_str(
            r#"{"title": "T", "link": "https://x.test", "contentSnippet": "S", "feedTitle": "F"}"#,
        )
        .unwrap();
        assert_eq!(input, article("T", Some("S"), None));
    }
}
