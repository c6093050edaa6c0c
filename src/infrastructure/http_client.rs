//! Resilient fetch layer
//!
//! A [`FetchSession`] owns one cookie-carrying transport, paces its requests
//! and retries failed attempts. Attempt 1 fires immediately; attempt `n >= 2`
//! first waits `base * 2^(n-2)`. A 429 response waits a random delay from the
//! rate-limit window and consumes an attempt slot. Any other failure pauses
//! briefly unless it was the last attempt, in which case it is returned as is.

use crate::infrastructure::config::{AppConfig, HttpConfig};
use crate::infrastructure::parsing_error::{FetchError, FetchResult};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, ClientBuilder, header};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Status, final URL and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub final_url: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One GET against the upstream site. Non-success statuses are returned, not raised.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> FetchResult<RawResponse>;
}

/// Transport backed by a cookie-aware `reqwest` client
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn from_config(config: &HttpConfig) -> FetchResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("el-GR,el;q=0.9,en;q=0.8"),
        );

        let client = ClientBuilder::new()
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| FetchError::ClientBuild {
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> FetchResult<RawResponse> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        if !response.status().is_success() {
            return Ok(RawResponse {
                status,
                final_url,
                body: String::new(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(RawResponse {
            status,
            final_url,
            body,
        })
    }
}

/// Attempt budget and delay schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub rate_limit_window: (Duration, Duration),
    pub error_pause: Duration,
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        let (lo, hi) = config.timing.rate_limit_delay_ms;
        Self {
            max_retries: config.http.max_retries.max(1),
            base_delay: Duration::from_millis(config.timing.retry_base_delay_ms),
            rate_limit_window: (Duration::from_millis(lo), Duration::from_millis(hi)),
            error_pause: Duration::from_millis(config.timing.error_delay_ms),
            request_timeout: config.http.request_timeout(),
        }
    }

    /// Wait before `attempt` (1-based); zero for the first attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 2);
        self.base_delay.saturating_mul(factor)
    }

    /// Random wait after a 429
    pub fn rate_limit_pause(&self) -> Duration {
        random_between(self.rate_limit_window.0, self.rate_limit_window.1)
    }
}

fn random_between(a: Duration, b: Duration) -> Duration {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let lo_ms = u64::try_from(lo.as_millis()).unwrap_or(u64::MAX);
    let hi_ms = u64::try_from(hi.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(fastrand::u64(lo_ms..=hi_ms))
}

/// A fetch session: one transport (and cookie jar), one pacing quota
pub struct FetchSession {
    id: Uuid,
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    limiter: Option<DefaultDirectRateLimiter>,
    base_url: String,
    session_timeout: Duration,
    warmup_window: (Duration, Duration),
}

impl FetchSession {
    /// Session without the warmup request
    pub fn new(transport: Arc<dyn HttpTransport>, config: &AppConfig) -> Self {
        let limiter = NonZeroU32::new(config.http.max_requests_per_second)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));
        let (lo, hi) = config.timing.session_init_delay_ms;

        Self {
            id: Uuid::new_v4(),
            transport,
            policy: RetryPolicy::from_config(config),
            limiter,
            base_url: config.site.base_url.clone(),
            session_timeout: config.http.session_timeout(),
            warmup_window: (Duration::from_millis(lo), Duration::from_millis(hi)),
        }
    }

    /// Session that has already visited the site root once
    pub async fn establish(transport: Arc<dyn HttpTransport>, config: &AppConfig) -> Self {
        let session = Self::new(transport, config);
        session.warmup().await;
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// GET the site root and pause briefly. Failures are ignored.
    pub async fn warmup(&self) {
        self.pace().await;
        match self.transport.get(&self.base_url, self.session_timeout).await {
            Ok(response) => {
                debug!(session = %self.id, status = response.status, "Session warmup complete");
            }
            Err(e) => {
                debug!(session = %self.id, "Session warmup failed (ignored): {}", e);
            }
        }
        sleep(random_between(self.warmup_window.0, self.warmup_window.1)).await;
    }

    /// GET `url` with retries; returns the first 2xx response
    pub async fn fetch(&self, url: &str) -> FetchResult<RawResponse> {
        let attempts = self.policy.max_retries;
        info!(session = %self.id, "🌐 HTTP GET {}", url);

        for attempt in 1..=attempts {
            let backoff = self.policy.backoff_delay(attempt);
            if !backoff.is_zero() {
                debug!(session = %self.id, "Backing off {:?} before attempt {}/{}", backoff, attempt, attempts);
                sleep(backoff).await;
            }
            self.pace().await;

            let failure = match self.transport.get(url, self.policy.request_timeout).await {
                Ok(response) if response.status == 429 => {
                    let pause = self.policy.rate_limit_pause();
                    warn!(
                        session = %self.id,
                        "⏳ Rate limited on attempt {}/{} for {}, waiting {:?}",
                        attempt, attempts, url, pause
                    );
                    sleep(pause).await;
                    continue;
                }
                Ok(response) if response.is_success() => {
                    debug!(session = %self.id, "Fetched {} on attempt {}", url, attempt);
                    return Ok(response);
                }
                Ok(response) => FetchError::status(response.status, url),
                Err(e) => e,
            };

            if attempt == attempts || !failure.is_retryable() {
                warn!(session = %self.id, "❌ Giving up on {} after {} attempts: {}", url, attempts, failure);
                return Err(failure);
            }
            warn!(session = %self.id, "⚠️ Attempt {}/{} failed for {}: {}", attempt, attempts, url, failure);
            sleep(self.policy.error_pause).await;
        }

        Err(FetchError::RateLimitExhausted {
            url: url.to_string(),
            attempts,
        })
    }

    /// Response body of a successful fetch
    pub async fn fetch_text(&self, url: &str) -> FetchResult<String> {
        self.fetch(url).await.map(|response| response.body)
    }

    async fn pace(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport that replays scripted statuses and records every requested URL
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<FetchResult<RawResponse>>>,
        requests: Mutex<Vec<String>>,
        fallback: Option<u16>,
    }

    impl ScriptedTransport {
        pub fn statuses(statuses: &[u16]) -> Self {
            let script = statuses
                .iter()
                .map(|&status| Ok(response(status, "<html></html>")))
                .collect();
            Self {
                script: Mutex::new(script),
                ..Self::default()
            }
        }

        pub fn always(status: u16) -> Self {
            Self {
                fallback: Some(status),
                ..Self::default()
            }
        }

        pub fn push(&self, outcome: FetchResult<RawResponse>) {
            self.script.lock().unwrap().push_back(outcome);
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    pub fn response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            final_url: "https://www.car.gr/".into(),
            body: body.into(),
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(&self, url: &str, _timeout: Duration) -> FetchResult<RawResponse> {
            self.requests.lock().unwrap().push(url.to_string());
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                return next;
            }
            match self.fallback {
                Some(status) => Ok(response(status, "")),
                None => Err(FetchError::transport(url, "script exhausted")),
            }
        }
    }
}
