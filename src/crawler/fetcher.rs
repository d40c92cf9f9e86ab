//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - Robots.txt checks, cached once per host per job
//! - Host politeness via the shared [`HostThrottle`]
//! - Error classification into [`FetchErrorKind`]
//! - Streaming image bodies to disk

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::crawler::scheduler::{FetchPermit, HostThrottle};
use crate::robots::RobotsCache;
use reqwest::{Client, Response};
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Why a request did not produce a usable body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchErrorKind {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Disallowed by robots.txt")]
    RobotsDisallowed,

    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

/// A failed request, recorded per URL and never fatal to the crawl
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(url: &Url, kind: FetchErrorKind) -> Self {
        Self {
            url: url.to_string(),
            kind,
        }
    }

    fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FetchErrorKind::Timeout
        } else if error.is_body() || error.is_decode() {
            FetchErrorKind::Body(error.without_url().to_string())
        } else {
            FetchErrorKind::Connection(error.without_url().to_string())
        };
        Self::new(url, kind)
    }
}

/// Raw page response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects, used as the base for relative links
    pub final_url: Url,
    pub status_code: u16,
    pub content_type: Option<String>,
    /// Body decoded with the Content-Type charset, UTF-8 when absent
    pub body: String,
}

impl FetchedPage {
    pub fn text(&self) -> &str {
        &self.body
    }
}

/// Builds an HTTP client with the crawler's identity and timeout
///
/// The user agent has the form `Name/Version (+ContactURL)`.
///
/// # Example
///
/// ```no_run
/// use pagefold::config::Config;
/// use pagefold::crawler::build_http_client;
///
/// let config = Config::default();
/// let client = build_http_client(&config.crawler, &config.user_agent).unwrap();
/// ```
pub fn build_http_client(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(crawler.request_timeout())
        .connect_timeout(crawler.request_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues the requests of one job
///
/// Shared by every fetch worker of the job. Each request first consults the
/// host's robots.txt, then waits for a politeness slot, then sends.
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    robots: RobotsCache,
    throttle: HostThrottle,
    respect_robots: bool,
    agent_token: String,
}

impl Fetcher {
    /// Creates a fetcher with a fresh client built from `config`
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.crawler, &config.user_agent)?;
        Ok(Self::with_client(
            client,
            &config.crawler,
            &config.user_agent.crawler_name,
        ))
    }

    pub fn with_client(client: Client, crawler: &CrawlerConfig, agent_token: &str) -> Self {
        Self {
            client,
            robots: RobotsCache::new(),
            throttle: HostThrottle::new(crawler),
            respect_robots: crawler.respect_robots_txt,
            agent_token: agent_token.to_string(),
        }
    }

    /// Fetches an HTML page
    ///
    /// Non-2xx statuses and non-HTML content types are failures. A missing
    /// Content-Type header is accepted as HTML.
    pub async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let (response, _permit) = self.send(url).await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(ct) = content_type.as_deref() {
            if !is_html(ct) {
                return Err(FetchError::new(
                    url,
                    FetchErrorKind::UnsupportedContent(ct.to_string()),
                ));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        tracing::debug!(url = %url, status = status_code, bytes = body.len(), "Fetched page");

        Ok(FetchedPage {
            final_url,
            status_code,
            content_type,
            body,
        })
    }

    /// Streams a resource to `dest`, returning the number of bytes written
    ///
    /// A partially written file is removed on failure.
    pub async fn fetch_to_file(&self, url: &Url, dest: &Path) -> Result<u64, FetchError> {
        let (mut response, _permit) = self.send(url).await?;

        let io_err = |e: std::io::Error| FetchError::new(url, FetchErrorKind::Body(e.to_string()));
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;

        let mut written = 0u64;
        let result = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| FetchError::from_reqwest(url, e))?
            {
                file.write_all(&chunk).await.map_err(io_err)?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(io_err)
        }
        .await;

        if let Err(e) = result {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(e);
        }

        Ok(written)
    }

    /// Stops all pending and future requests of this job
    pub fn close(&self) {
        self.throttle.close();
    }

    async fn send(&self, url: &Url) -> Result<(Response, FetchPermit), FetchError> {
        let mut crawl_delay = None;
        if self.respect_robots {
            let rules = self.robots.rules_for(&self.client, url).await;
            if !rules.is_allowed(url.as_str(), &self.agent_token) {
                tracing::info!(url = %url, "Disallowed by robots.txt");
                return Err(FetchError::new(url, FetchErrorKind::RobotsDisallowed));
            }
            crawl_delay = rules.crawl_delay(&self.agent_token);
        }

        let permit = self
            .throttle
            .acquire(url, crawl_delay)
            .await
            .map_err(|_| FetchError::new(url, FetchErrorKind::Cancelled))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                url,
                FetchErrorKind::HttpStatus(status.as_u16()),
            ));
        }

        Ok((response, permit))
    }
}

fn is_html(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.crawler.request_delay_ms = 0;
        config.crawler.request_jitter_ms = 0;
        config.crawler.request_timeout_secs = 2;
        config
    }

    #[test]
    fn test_build_http_client() {
        let config = test_config();
        assert!(build_http_client(&config.crawler, &config.user_agent).is_ok());
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("application/xhtml+xml"));
        assert!(!is_html("application/pdf"));
    }

    #[tokio::test]
    async fn test_fetch_page_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html><title>Hi</title></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&test_config()).unwrap();
        let url = Url::parse(&format!("{}/", server.uri())).unwrap();
        let page = fetcher.fetch_page(&url).await.unwrap();

        assert_eq!(page.status_code, 200);
        assert!(page.text().contains("Hi"));
    }

    #[tokio::test]
    async fn test_fetch_page_decodes_declared_charset() {
        let server = MockServer::start().await;
        let mut body = b"<html><title>Caf".to_vec();
        body.push(0xE9);
        body.extend_from_slice(b"</title></html>");
        Mock::given(method("GET"))
            .and(path("/latin"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=iso-8859-1"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&test_config()).unwrap();
        let url = Url::parse(&format!("{}/latin", server.uri())).unwrap();
        let page = fetcher.fetch_page(&url).await.unwrap();

        assert!(page.text().contains("Café"));
    }

    #[tokio::test]
    async fn test_http_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&test_config()).unwrap();
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = fetcher.fetch_page(&url).await.unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::HttpStatus(404));
        assert_eq!(err.to_string(), "HTTP 404");
    }

    #[tokio::test]
    async fn test_non_html_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&test_config()).unwrap();
        let url = Url::parse(&format!("{}/data", server.uri())).unwrap();
        let err = fetcher.fetch_page(&url).await.unwrap_err();

        assert!(matches!(err.kind, FetchErrorKind::UnsupportedContent(_)));
    }

    #[tokio::test]
    async fn test_robots_disallow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&test_config()).unwrap();
        let url = Url::parse(&format!("{}/private", server.uri())).unwrap();
        let err = fetcher.fetch_page(&url).await.unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::RobotsDisallowed);
    }

    #[tokio::test]
    async fn test_robots_ignored_when_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html"))
            .mount(&server)
            .await;

        let mut config = test_config();
        config.crawler.respect_robots_txt = false;
        let fetcher = Fetcher::new(&config).unwrap();
        let url = Url::parse(&format!("{}/", server.uri())).unwrap();

        assert!(fetcher.fetch_page(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_to_file_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("logo.png");
        let fetcher = Fetcher::new(&test_config()).unwrap();
        let url = Url::parse(&format!("{}/logo.png", server.uri())).unwrap();

        let written = fetcher.fetch_to_file(&url, &dest).await.unwrap();
        assert_eq!(written, 2048);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 2048);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let mut config = test_config();
        config.crawler.respect_robots_txt = false;
        let fetcher = Fetcher::new(&config).unwrap();
        let url = Url::parse("http://127.0.0.1:9/").unwrap();

        let err = fetcher.fetch_page(&url).await.unwrap_err();
        assert!(matches!(
            err.kind,
            FetchErrorKind::Connection(_) | FetchErrorKind::Timeout
        ));
    }

    #[tokio::test]
    async fn test_closed_fetcher_cancels() {
        let mut config = test_config();
        config.crawler.respect_robots_txt = false;
        let fetcher = Fetcher::new(&config).unwrap();
        fetcher.close();

        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let err = fetcher.fetch_page(&url).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Cancelled);
    }
}
