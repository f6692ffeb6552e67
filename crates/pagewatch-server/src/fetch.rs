//! HTTP fetcher for the watched page.
//!
//! One GET per call with an overall timeout. Redirects are followed by hand
//! with a hop counter so the limit and the resolution of relative
//! `Location` headers are explicit; the underlying client never follows
//! redirects itself.

use std::time::Duration;

use reqwest::header::{ACCEPT_LANGUAGE, LOCATION};
use reqwest::StatusCode;
use url::Url;

use crate::config::Config;

/// Why a fetch produced no body.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),

    #[error("Invalid redirect location: {0}")]
    InvalidRedirect(String),
}

impl FetchError {
    /// Short machine-friendly label, used in logs and `/health`.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::HttpStatus(_) => "http_status",
            FetchError::Transport(_) => "transport",
            FetchError::TooManyRedirects(_) => "too_many_redirects",
            FetchError::InvalidRedirect(_) => "invalid_redirect",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        // Per-request timeouts from the client surface as reqwest errors too
        if e.is_timeout() {
            FetchError::Timeout(Duration::ZERO)
        } else {
            FetchError::Transport(e)
        }
    }
}

/// A successful fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// URL the body was finally served from.
    pub final_url: Url,
    /// Redirect hops taken to get there.
    pub hops: usize,
    pub body: Vec<u8>,
}

/// GET client with fixed headers, timeout and redirect limit.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    accept_language: String,
    timeout: Duration,
    max_redirects: usize,
}

impl Fetcher {
    pub fn new(
        user_agent: &str,
        accept_language: &str,
        timeout: Duration,
        max_redirects: usize,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self {
            client,
            accept_language: accept_language.to_string(),
            timeout,
            max_redirects,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(
            &config.user_agent,
            &config.accept_language,
            config.timeout,
            config.max_redirects,
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch `url`, following up to `max_redirects` redirects.
    ///
    /// The timeout covers the whole chain including the body read. When it
    /// fires the in-flight request is dropped.
    pub async fn fetch(&self, url: &Url) -> Result<Fetched, FetchError> {
        match tokio::time::timeout(self.timeout, self.follow(url.clone())).await {
            Ok(Ok(fetched)) => Ok(fetched),
            Ok(Err(FetchError::Timeout(_))) | Err(_) => Err(FetchError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(e),
        }
    }

    async fn follow(&self, mut url: Url) -> Result<Fetched, FetchError> {
        let mut hops = 0usize;

        loop {
            let resp = self
                .client
                .get(url.clone())
                .header(ACCEPT_LANGUAGE, self.accept_language.as_str())
                .send()
                .await?;

            let status = resp.status();

            if status.is_redirection() {
                if let Some(location) = resp.headers().get(LOCATION) {
                    if hops >= self.max_redirects {
                        return Err(FetchError::TooManyRedirects(self.max_redirects));
                    }
                    let next = resolve_location(&url, location.as_bytes())?;
                    tracing::debug!("redirect {} -> {next} ({status})", url);
                    hops += 1;
                    url = next;
                    continue;
                }
            }

            if status != StatusCode::OK {
                // Dropping the response discards the body unread
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let body = resp.bytes().await?.to_vec();
            return Ok(Fetched {
                final_url: url,
                hops,
                body,
            });
        }
    }
}

fn resolve_location(base: &Url, location: &[u8]) -> Result<Url, FetchError> {
    let raw = std::str::from_utf8(location)
        .map_err(|_| FetchError::InvalidRedirect(String::from_utf8_lossy(location).into_owned()))?;
    let next = base
        .join(raw.trim())
        .map_err(|_| FetchError::InvalidRedirect(raw.to_string()))?;
    match next.scheme() {
        "http" | "https" => Ok(next),
        _ => Err(FetchError::InvalidRedirect(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout_ms: u64) -> Fetcher {
        Fetcher::new(
            "pagewatch-test/1.0",
            "es",
            Duration::from_millis(timeout_ms),
            5,
        )
        .unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{p}", server.uri())).unwrap()
    }

    #[test]
    fn test_resolve_relative_and_absolute_locations() {
        let base = Url::parse("https://example.com/wiki/Page").unwrap();
        assert_eq!(
            resolve_location(&base, b"/wiki/Other").unwrap().as_str(),
            "https://example.com/wiki/Other"
        );
        assert_eq!(
            resolve_location(&base, b"https://other.org/x").unwrap().as_str(),
            "https://other.org/x"
        );
        assert!(resolve_location(&base, b"mailto:someone@example.com").is_err());
    }

    #[tokio::test]
    async fn test_fetch_ok_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", "pagewatch-test/1.0"))
            .and(header("accept-language", "es"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>Hello</title>"))
            .mount(&server)
            .await;

        let fetched = fetcher(2_000).fetch(&url(&server, "/page")).await.unwrap();
        assert_eq!(fetched.body, b"<title>Hello</title>");
        assert_eq!(fetched.hops, 0);
    }

    #[tokio::test]
    async fn test_fetch_non_200_is_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let err = fetcher(2_000).fetch(&url(&server, "/")).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(404)));
        assert_eq!(err.kind(), "http_status");
    }

    #[tokio::test]
    async fn test_fetch_other_2xx_is_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let err = fetcher(2_000).fetch(&url(&server, "/")).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(204)));
    }

    #[tokio::test]
    async fn test_fetch_follows_relative_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
            .mount(&server)
            .await;

        let fetched = fetcher(2_000).fetch(&url(&server, "/old")).await.unwrap();
        assert_eq!(fetched.body, b"moved here");
        assert_eq!(fetched.hops, 1);
        assert_eq!(fetched.final_url.path(), "/new");
    }

    #[tokio::test]
    async fn test_fetch_redirect_loop_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
            .mount(&server)
            .await;

        let err = fetcher(5_000).fetch(&url(&server, "/loop")).await.unwrap_err();
        assert!(matches!(err, FetchError::TooManyRedirects(5)));

        // First request plus five followed hops
        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 6);
    }

    #[tokio::test]
    async fn test_fetch_redirect_without_location_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(302))
            .mount(&server)
            .await;

        let err = fetcher(2_000).fetch(&url(&server, "/")).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(302)));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<title>late</title>")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        let err = fetcher(200).fetch(&url(&server, "/")).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(d) if d == Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_transport() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let target = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

        let err = fetcher(2_000).fetch(&target).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)), "got {err:?}");
    }
}
