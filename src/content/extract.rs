use reqwest::header::USER_AGENT;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::html::{html_to_text, push_text};
use crate::util::{
    bounded, collapse_whitespace, read_limited_bytes, validate_article_url, BodyError, Interrupted,
};

const MAX_PAGE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Many publishers serve reduced or blocked pages to non-browser agents.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Page chrome removed before text is taken.
const STRIPPED_SELECTORS: &str =
    "script, style, nav, footer, header, aside, noscript, iframe, .ads, .advertisement";

/// Containers that usually hold the article body.
const CONTENT_SELECTORS: &str = "article, main, .content, .post-content";

const DEFAULT_TITLE: &str = "Article";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Invalid article URL: {0}")]
    InvalidUrl(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Request cancelled")]
    Cancelled,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl From<BodyError> for ContentError {
    fn from(value: BodyError) -> Self {
        match value {
            BodyError::TooLarge(limit) => ContentError::ResponseTooLarge(limit),
            BodyError::Incomplete { expected, received } => {
                ContentError::IncompleteResponse { expected, received }
            }
            BodyError::Network(e) => ContentError::Network(e),
        }
    }
}

impl From<Interrupted> for ContentError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::TimedOut(_) => ContentError::Timeout,
            Interrupted::Cancelled => ContentError::Cancelled,
        }
    }
}

/// Readable text of one web page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    /// Whitespace-collapsed body text; may be empty.
    pub text: String,
}

/// Downloads `url` and extracts its readable text.
///
/// `allow_private_hosts` disables the SSRF guard for loopback and private
/// addresses; leave it off when the URL comes from an API caller.
///
/// # Errors
///
/// Any failure to obtain the page body (bad URL, timeout, cancellation,
/// transport error, non-2xx status, oversized body). Thin or empty pages are
/// not an error here; callers judge whether the text is sufficient.
pub async fn fetch_article(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    allow_private_hosts: bool,
) -> Result<ExtractedPage, ContentError> {
    let parsed_url = validate_article_url(url, allow_private_hosts)
        .map_err(|e| ContentError::InvalidUrl(e.to_string()))?;

    let html = bounded(timeout, cancel, async {
        let response = client
            .get(parsed_url.as_str())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ContentError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_PAGE_SIZE).await?;
        // Pages in legacy encodings still yield usable text
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    })
    .await??;

    let page = extract_page(&html);
    tracing::debug!(
        url = %parsed_url,
        title = %page.title,
        chars = page.text.len(),
        "Extracted article text"
    );
    Ok(page)
}

struct PageSelectors {
    stripped: Selector,
    content: Selector,
    body: Selector,
    title: Selector,
}

impl PageSelectors {
    fn get() -> Option<&'static Self> {
        static SELECTORS: OnceLock<Option<PageSelectors>> = OnceLock::new();
        SELECTORS
            .get_or_init(|| {
                Some(PageSelectors {
                    stripped: Selector::parse(STRIPPED_SELECTORS).ok()?,
                    content: Selector::parse(CONTENT_SELECTORS).ok()?,
                    body: Selector::parse("body").ok()?,
                    title: Selector::parse("title").ok()?,
                })
            })
            .as_ref()
    }
}

/// Extracts title and main text from a full HTML document.
///
/// Text comes from the outermost content containers (`article`, `main`,
/// `.content`, `.post-content`) with page chrome removed; when none of them
/// yields text the whole `<body>` is used. The title is the page `<title>`,
/// or `"Article"` when absent.
pub fn extract_page(html: &str) -> ExtractedPage {
    let Some(sel) = PageSelectors::get() else {
        return ExtractedPage {
            title: DEFAULT_TITLE.to_string(),
            text: html_to_text(html),
        };
    };

    let document = Html::parse_document(html);

    let title = document
        .select(&sel.title)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let mut raw = String::new();
    for container in document.select(&sel.content) {
        let nested_or_stripped = container
            .ancestors()
            .filter_map(scraper::ElementRef::wrap)
            .any(|a| sel.content.matches(&a) || sel.stripped.matches(&a))
            || sel.stripped.matches(&container);
        if !nested_or_stripped {
            push_text(container, Some(&sel.stripped), &mut raw);
            raw.push(' ');
        }
    }

    let mut text = collapse_whitespace(&raw);
    if text.is_empty() {
        raw.clear();
        match document.select(&sel.body).next() {
            Some(body) => push_text(body, Some(&sel.stripped), &mut raw),
            None => push_text(document.root_element(), Some(&sel.stripped), &mut raw),
        }
        text = collapse_whitespace(&raw);
    }

    ExtractedPage { title, text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{headers, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<!doctype html>
<html><head><title> Launch Day </title><style>.x{color:red}</style></head>
<body>
  <header>Site header</header>
  <nav>Home | About</nav>
  <article>
    <h1>Big news</h1>
    <p>The rocket   launched <b>on time</b>.</p>
    <script>track()</script>
    <div class="ads">Buy now</div>
    <aside>Related stories</aside>
  </article>
  <footer>Copyright</footer>
</body></html>"#;

    #[test]
    fn test_extract_article_container() {
        let page = extract_page(PAGE);
        assert_eq!(page.title, "Launch Day");
        assert_eq!(page.text, "Big news The rocket launched on time.");
    }

    #[test]
    fn test_extract_falls_back_to_body() {
        let html = "<html><body><nav>menu</nav><div><p>Plain body text</p></div></body></html>";
        let page = extract_page(html);
        assert_eq!(page.title, "Article");
        assert_eq!(page.text, "Plain body text");
    }

    #[test]
    fn test_nested_containers_not_duplicated() {
        let html = r#"<html><body>
            <main><article><p>Once</p></article></main>
            <div class="content">Twice</div>
        </body></html>"#;
        assert_eq!(extract_page(html).text, "Once Twice");
    }

    #[test]
    fn test_container_inside_stripped_chrome_ignored() {
        let html = r#"<html><body>
            <header><div class="content">Header promo</div></header>
            <article>Story</article>
        </body></html>"#;
        assert_eq!(extract_page(html).text, "Story");
    }

    #[tokio::test]
    async fn test_fetch_article_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            // wiremock splits received header values on ',', so the UA is matched in parts
            .and(headers(
                "user-agent",
                BROWSER_USER_AGENT.split(',').map(str::trim).collect(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let page = fetch_article(
            &client,
            &format!("{}/post", mock_server.uri()),
            Duration::from_secs(5),
            &CancellationToken::new(),
            true,
        )
        .await
        .unwrap();

        assert_eq!(page.title, "Launch Day");
        assert!(page.text.contains("rocket launched"));
    }

    #[tokio::test]
    async fn test_fetch_article_404() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_article(
            &client,
            &format!("{}/missing", mock_server.uri()),
            Duration::from_secs(5),
            &CancellationToken::new(),
            true,
        )
        .await;

        assert!(matches!(result, Err(ContentError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_private_host_rejected_by_default() {
        let client = reqwest::Client::new();
        let result = fetch_article(
            &client,
            "http://127.0.0.1:9/secret",
            Duration::from_secs(5),
            &CancellationToken::new(),
            false,
        )
        .await;

        assert!(matches!(result, Err(ContentError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_slow_page_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(PAGE)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_article(
            &client,
            &mock_server.uri(),
            Duration::from_millis(100),
            &CancellationToken::new(),
            true,
        )
        .await;

        assert!(matches!(result, Err(ContentError::Timeout)));
    }

    #[tokio::test]
    async fn test_oversized_page_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(MAX_PAGE_SIZE + 1)))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_article(
            &client,
            &mock_server.uri(),
            Duration::from_secs(5),
            &CancellationToken::new(),
            true,
        )
        .await;

        assert!(matches!(result, Err(ContentError::ResponseTooLarge(MAX_PAGE_SIZE))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_decoded_lossily() {
        let mock_server = MockServer::start().await;
        let mut body = b"<html><head><title>Caf".to_vec();
        body.push(0xE9);
        body.extend_from_slice(b"</title></head><body><p>Menu</p></body></html>");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let page = fetch_article(
            &client,
            &mock_server.uri(),
            Duration::from_secs(5),
            &CancellationToken::new(),
            true,
        )
        .await
        .unwrap();

        assert!(page.title.starts_with("Caf"));
        assert_eq!(page.text, "Menu");
    }
}
