use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::feed::parser::{parse_feed, ParseResult, ParsedFeed};
use crate::util::{bounded, parse_http_url, read_limited_bytes, BodyError, Interrupted};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching one feed.
///
/// A fetch either yields the whole parsed feed or one of these; there is no
/// partial result and no retry at this layer.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The subscription URL is not an http(s) URL
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("Request cancelled")]
    Cancelled,
    /// Feed body could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl From<Interrupted> for FetchError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::TimedOut(_) => FetchError::Timeout,
            Interrupted::Cancelled => FetchError::Cancelled,
        }
    }
}

impl From<BodyError> for FetchError {
    fn from(value: BodyError) -> Self {
        match value {
            BodyError::TooLarge(_) => FetchError::ResponseTooLarge,
            BodyError::Incomplete { expected, received } => {
                FetchError::IncompleteResponse { expected, received }
            }
            BodyError::Network(e) => FetchError::Network(e),
        }
    }
}

/// Fetches and parses a single feed.
///
/// The whole exchange (connect, headers, body) shares one `timeout` budget
/// and stops early when `cancel` fires.
///
/// # Errors
///
/// - [`FetchError::InvalidUrl`] - `url` is not http(s); no request is made
/// - [`FetchError::Timeout`] / [`FetchError::Cancelled`]
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - Body exceeded 10MB
/// - [`FetchError::Parse`] - Not a feed
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ParsedFeed, FetchError> {
    let parsed_url = parse_http_url(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

    let bytes = bounded(timeout, cancel, async {
        let response = client.get(parsed_url.as_str()).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        Ok(read_limited_bytes(response, MAX_FEED_SIZE).await?)
    })
    .await??;

    let ParseResult { feed, skipped } =
        parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    if skipped > 0 {
        tracing::warn!(
            feed = %url,
            filtered = skipped,
            "Items without a valid link skipped"
        );
    }

    tracing::debug!(feed = %url, items = feed.items.len(), "Fetched feed");
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Mock Feed</title>
    <item><title>Test</title><link>https://example.com/1</link></item>
</channel></rss>"#;

    async fn fetch(url: &str) -> Result<ParsedFeed, FetchError> {
        let client = reqwest::Client::new();
        fetch_feed(
            &client,
            url,
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let feed = fetch(&format!("{}/feed", mock_server.uri())).await.unwrap();
        assert_eq!(feed.title.as_deref(), Some("Mock Feed"));
        assert_eq!(feed.items.len(), 1);
    }

    #[tokio::test]
    async fn test_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        match fetch(&format!("{}/feed", mock_server.uri())).await {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = fetch(&format!("{}/feed", mock_server.uri())).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let result = fetch(&format!("{}/feed", mock_server.uri())).await;
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_slow_host_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_feed(
            &client,
            &format!("{}/feed", mock_server.uri()),
            Duration::from_millis(100),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_cancelled_fetch() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = reqwest::Client::new();
        let result = fetch_feed(
            &client,
            "https://example.com/feed",
            Duration::from_secs(5),
            &cancel,
        )
        .await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_non_http_url_rejected_without_request() {
        let result = fetch("file:///etc/passwd").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
