//! HTTP client wrapper with rate limiting, retries, and request tracking

use crate::error::{Result, VantageError};
use crate::models::AuditConfig;
use reqwest::{Client, Response, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

const MAX_REDIRECTS: usize = 10;

/// HTTP client used to fetch audited sites
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_count: Arc<AtomicU64>,
    rate_limiter: Option<Arc<Semaphore>>,
    rate_limit_delay: Option<Duration>,
    max_body_bytes: usize,
}

impl HttpClient {
    /// Creates a new HttpClient from audit configuration
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(MAX_REDIRECTS)
            } else {
                reqwest::redirect::Policy::none()
            })
            .cookie_store(true)
            .build()?;

        let (rate_limiter, rate_limit_delay) = match config.rate_limit {
            Some(rps) if rps > 0 => (
                Some(Arc::new(Semaphore::new(rps as usize))),
                Some(Duration::from_millis(1000 / u64::from(rps))),
            ),
            _ => (None, None),
        };

        Ok(Self {
            client,
            request_count: Arc::new(AtomicU64::new(0)),
            rate_limiter,
            rate_limit_delay,
            max_body_bytes: config.max_page_bytes,
        })
    }

    /// Sends a GET request with rate limiting and retry logic
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request_with_retry(|| self.client.get(url)).await
    }

    /// Sends a GET request with custom headers
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Response> {
        self.request_with_retry(|| {
            let mut req = self.client.get(url);
            for (key, value) in headers {
                req = req.header(key.as_str(), value.as_str());
            }
            req
        })
        .await
    }

    /// Returns true when `url` answers a GET with a 2xx status
    pub async fn exists(&self, url: &str) -> bool {
        match self.get(url).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Probe of {url} failed: {e}");
                false
            }
        }
    }

    /// Reads a response body, keeping at most the configured size limit.
    /// The rest is drained so the returned byte count is the full body size.
    pub async fn read_body(&self, mut response: Response) -> Result<(String, usize)> {
        let mut buf: Vec<u8> = Vec::new();
        let mut total = 0usize;

        while let Some(chunk) = response.chunk().await? {
            total += chunk.len();
            let room = self.max_body_bytes.saturating_sub(buf.len());
            if room < chunk.len() && buf.len() < self.max_body_bytes {
                debug!("Body exceeds {} bytes, truncating", self.max_body_bytes);
            }
            buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }

        Ok((String::from_utf8_lossy(&buf).into_owned(), total))
    }

    /// Returns the total number of requests made
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Executes a request with retry logic and rate limiting
    async fn request_with_retry<F>(&self, build_request: F) -> Result<Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        const MAX_RETRIES: u32 = 2;
        const INITIAL_BACKOFF_MS: u64 = 500;

        // Held until the response headers arrive
        let _permit = match self.rate_limiter {
            Some(ref limiter) => Some(
                limiter
                    .acquire()
                    .await
                    .map_err(|_| VantageError::RateLimitExceeded)?,
            ),
            None => None,
        };
        if let Some(delay) = self.rate_limit_delay {
            sleep(delay).await;
        }

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1));
                debug!("Retry attempt {attempt}, waiting {backoff:?}");
                sleep(backoff).await;
            }

            self.request_count.fetch_add(1, Ordering::Relaxed);

            match build_request().send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!("Response: {status} for {}", response.url());

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        warn!("Rate limited by target, backing off");
                        last_error = Some(VantageError::RateLimitExceeded);
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    warn!("Request failed (attempt {attempt}): {e}");
                    last_error = Some(VantageError::HttpError(e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| VantageError::TargetUnreachable("max retries exceeded".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_permit_held_until_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(600)))
            .mount(&server)
            .await;

        let config = AuditConfig {
            rate_limit: Some(10),
            ..AuditConfig::default()
        };
        let client = HttpClient::from_config(&config).expect("client");
        let limiter = Arc::clone(client.rate_limiter.as_ref().expect("limiter"));
        let url = format!("{}/", server.uri());

        let in_flight = {
            let client = client.clone();
            tokio::spawn(async move { client.get(&url).await.map(|r| r.status()) })
        };
        sleep(Duration::from_millis(350)).await;
        assert_eq!(limiter.available_permits(), 9);

        let status = in_flight.await.expect("join").expect("response");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(limiter.available_permits(), 10);
    }

    #[tokio::test]
    async fn test_truncated_body_reports_full_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(5000)))
            .mount(&server)
            .await;

        let config = AuditConfig {
            rate_limit: None,
            max_page_bytes: 1000,
            ..AuditConfig::default()
        };
        let client = HttpClient::from_config(&config).expect("client");
        let response = client.get(&server.uri()).await.expect("response");
        let (body, size) = client.read_body(response).await.expect("body");
        assert_eq!(body.len(), 1000);
        assert_eq!(size, 5000);
    }
}
