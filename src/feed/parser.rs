use chrono::SecondsFormat;
use feed_rs::model::{Entry, Link};
use feed_rs::parser;
use serde::{Deserialize, Serialize};

use crate::content::html_to_text;
use crate::util::is_valid_link;

/// One normalized feed item.
///
/// Field names serialize in the shape the web front end has always consumed
/// (`pubDate`, `isoDate`, `contentSnippet`). `link` is empty when the source
/// item carried none; such items never leave [`parse_feed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// Feed-level metadata plus its items, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFeed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub items: Vec<Article>,
}

/// Output of [`parse_feed`]: the feed and how many items were dropped for
/// lacking a usable link.
#[derive(Debug)]
pub struct ParseResult {
    pub feed: ParsedFeed,
    pub skipped: usize,
}

/// Parses RSS/Atom/JSON Feed bytes and drops items without a valid link.
pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let items: Vec<Article> = feed.entries.into_iter().map(normalize_entry).collect();
    let (items, skipped) = retain_valid_links(items);

    Ok(ParseResult {
        feed: ParsedFeed {
            title: feed.title.map(|t| t.content.trim().to_string()),
            description: feed.description.map(|t| t.content.trim().to_string()),
            link: preferred_link(&feed.links),
            items,
        },
        skipped,
    })
}

/// Keeps items whose link parses as an absolute URL, preserving order.
///
/// Retained items are moved through untouched. Returns the survivors and the
/// number of items dropped.
pub fn retain_valid_links(items: Vec<Article>) -> (Vec<Article>, usize) {
    let before = items.len();
    let kept: Vec<Article> = items
        .into_iter()
        .filter(|item| is_valid_link(&item.link))
        .collect();
    let skipped = before - kept.len();
    (kept, skipped)
}

fn normalize_entry(entry: Entry) -> Article {
    let link = preferred_link(&entry.links).unwrap_or_default();
    let timestamp = entry.published.or(entry.updated);

    let summary = entry.summary.map(|s| s.content);
    let body = entry.content.and_then(|c| c.body);
    let content = body.clone().or_else(|| summary.clone());
    let content_snippet = summary
        .or(body)
        .map(|html| html_to_text(&html))
        .filter(|s| !s.is_empty());

    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let categories = entry
        .categories
        .into_iter()
        .map(|c| c.label.unwrap_or(c.term))
        .filter(|c| !c.trim().is_empty())
        .collect();

    Article {
        title,
        link,
        pub_date: timestamp.map(|dt| dt.to_rfc2822()),
        content,
        content_snippet,
        iso_date: timestamp.map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        categories,
    }
}

/// Picks the `alternate` (or unlabelled) link, falling back to the first one.
fn preferred_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
}
