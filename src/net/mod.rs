//! HTTP access with rate limiting and retries.
//!
//! The client downloads manga covers and banners through [`HttpClient`];
//! content sources are free to use it for their own requests as well.
//!
//! - **Shared connection pool**: one lazily built `reqwest` client
//! - **Rate Limiting**: a minimum delay between requests per key
//! - **Retry Logic**: exponential backoff on `429` and transport errors
//!
//! # Examples
//!
//! ```rust,no_run
//! use kanko::net::HttpClient;
//!
//! # async fn example() -> kanko::Result<()> {
//! let client = HttpClient::new("covers")
//!     .with_rate_limit(500)
//!     .with_max_retries(3)
//!     .with_header("User-Agent", "kanko");
//!
//! let image = client.get("https://example.com/cover.jpg").await?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default `User-Agent` sent by [`HttpClient`].
pub const DEFAULT_USER_AGENT: &str = concat!("kanko/", env!("CARGO_PKG_VERSION"));

/// `Accept` header used for image downloads.
pub const ACCEPT_IMAGE: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(DEFAULT_USER_AGENT)
        .pool_max_idle_per_host(10)
        .gzip(true)
        .brotli(true)
        .build()
        .expect("Failed to build HTTP client")
});

/// Enforces a minimum delay between requests sharing a key.
///
/// # Thread Safety
///
/// The last request times are kept behind a `Mutex`, so a limiter can be
/// shared between tasks.
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Mutex<HashMap<String, Instant>>,
    delay: Duration,
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            last_request: Mutex::new(HashMap::new()),
            delay: self.delay,
        }
    }
}

impl RateLimiter {
    /// Creates a limiter with `delay_ms` milliseconds between requests.
    pub fn new(delay_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(HashMap::new()),
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Sleeps until a request for `key` is allowed.
    pub async fn wait(&self, key: &str) {
        let wait_duration = {
            let last_map = self.last_request.lock();
            last_map
                .get(key)
                .map(|last| last.elapsed())
                .filter(|elapsed| *elapsed < self.delay)
                .map(|elapsed| self.delay - elapsed)
        };

        if let Some(duration) = wait_duration {
            tokio::time::sleep(duration).await;
        }

        self.last_request
            .lock()
            .insert(key.to_string(), Instant::now());
    }
}

/// HTTP client wrapper with built-in rate limiting and retry logic.
#[derive(Clone, Debug)]
pub struct HttpClient {
    key: String,
    rate_limiter: RateLimiter,
    max_retries: u32,
    headers: HeaderMap,
}

impl HttpClient {
    /// Creates a client rate limited under `key`.
    ///
    /// Defaults to a 200ms delay and 3 retries.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rate_limiter: RateLimiter::new(200),
            max_retries: 3,
            headers: HeaderMap::new(),
        }
    }

    /// Sets the minimum delay between requests in milliseconds.
    pub fn with_rate_limit(mut self, delay_ms: u64) -> Self {
        self.rate_limiter = RateLimiter::new(delay_ms);
        self
    }

    /// Sets the maximum number of retries for failed requests.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Adds a header sent with every request. Invalid headers are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Some((name, value)) = parse_header(name, value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Performs a GET request with the client headers.
    ///
    /// # Errors
    ///
    /// * [`Error::RateLimit`](crate::Error::RateLimit) - If rate limited after retries
    /// * [`Error::Source`](crate::Error::Source) - For HTTP errors (4xx, 5xx)
    /// * [`Error::Network`](crate::Error::Network) - For network/connection errors
    pub async fn get(&self, url: &str) -> crate::Result<Bytes> {
        self.get_with_headers(url, &HashMap::new()).await
    }

    /// Performs a GET request, adding `extra` on top of the client headers.
    pub async fn get_with_headers(
        &self,
        url: &str,
        extra: &HashMap<String, String>,
    ) -> crate::Result<Bytes> {
        let mut headers = self.headers.clone();
        for (name, value) in extra {
            if let Some((name, value)) = parse_header(name, value) {
                headers.insert(name, value);
            }
        }

        let mut attempts = 0;
        loop {
            self.rate_limiter.wait(&self.key).await;
            debug!(url, attempt = attempts + 1, "GET");

            match CLIENT.get(url).headers(headers.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.bytes().await?);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        if attempts < self.max_retries {
                            attempts += 1;
                            let delay = backoff_delay(attempts);
                            warn!(url, ?delay, "rate limited, backing off");
                            tokio::time::sleep(delay).await;
                            continue;
                        }

                        let retry_after = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok());

                        return Err(crate::Error::rate_limit(retry_after));
                    }

                    return Err(crate::Error::source(
                        &self.key,
                        format!("HTTP {status} for {url}"),
                    ));
                }
                Err(e) => {
                    if attempts < self.max_retries {
                        attempts += 1;
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

/// Exponential backoff after `attempts` rate-limited requests, capped at 64s.
fn backoff_delay(attempts: u32) -> Duration {
    Duration::from_secs(2_u64.saturating_pow(attempts.min(6)))
}

fn parse_header(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    Some((name.parse().ok()?, value.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_delays_same_key() {
        let limiter = RateLimiter::new(50);
        let start = Instant::now();
        limiter.wait("covers").await;
        limiter.wait("covers").await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_retries() {
        let client = HttpClient::new("test").with_rate_limit(0).with_max_retries(0);
        let err = client.get("not-a-url").await.unwrap_err();
        assert!(matches!(err, crate::Error::Network(_)));
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(6), Duration::from_secs(64));
        assert_eq!(backoff_delay(64), Duration::from_secs(64));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(64));
    }

    #[test]
    fn test_invalid_headers_are_ignored() {
        let client = HttpClient::new("test")
            .with_header("Referer", "https://example.com")
            .with_header("bad header", "value");
        assert_eq!(client.headers.len(), 1);
    }
}
