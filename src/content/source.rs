use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::extract::{fetch_article, ContentError, ExtractedPage};

/// Where article pages come from.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractedPage, ContentError>;
}

/// Fetches pages over HTTP with [`fetch_article`].
#[derive(Clone)]
pub struct HttpArticleSource {
    client: reqwest::Client,
    timeout: Duration,
    allow_private_hosts: bool,
}

impl HttpArticleSource {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            allow_private_hosts: false,
        }
    }

    /// Permits loopback and private-network article URLs.
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }
}

#[async_trait]
impl ArticleSource for HttpArticleSource {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractedPage, ContentError> {
        fetch_article(
            &self.client,
            url,
            self.timeout,
            cancel,
            self.allow_private_hosts,
        )
        .await
    }
}
