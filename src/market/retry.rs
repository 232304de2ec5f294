//! Retry policy for the market data APIs
//!
//! One policy serves every call site (ticker pages, quotes, ESG):
//! - 200: parse and return the JSON body
//! - 429: wait for `Retry-After` (or the backoff schedule) and try again
//! - any other status: give up immediately
//! - transport failure or unparseable 200 body: back off and retry up to
//!   `max_attempts`
//!
//! Nothing here returns an error. Exhausted or terminal failures come back
//! as `FetchOutcome::Failed` so callers can degrade to "no data".

use crate::market::transport::{ApiRequest, HttpTransport};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Why a fetch produced no payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Non-success status that is not worth retrying
    Status(u16),
    /// Still rate limited after the rate-limit budget was spent
    RateLimited,
    /// Timeouts or connection errors on every attempt
    Transport(String),
    /// 200 with a body that is not JSON
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Value),
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn payload(self) -> Option<Value> {
        match self {
            FetchOutcome::Success(value) => Some(value),
            FetchOutcome::Failed(_) => None,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts allowed when the transport fails or the body is not JSON
    pub max_attempts: u32,

    /// Backoff unit; the n-th retry waits `n * base_delay`
    pub base_delay: Duration,

    /// Extra requests allowed after 429 responses
    pub rate_limit_retries: u32,

    /// Upper bound on any single wait, server hints included
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            rate_limit_retries: 3,
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff: 2s, 4s, 6s with the default base
    pub fn backoff(&self, attempt: u32) -> Duration {
        (self.base_delay * attempt).min(self.max_wait)
    }

    /// Statuses that earn another attempt
    pub fn is_retryable_status(status: u16) -> bool {
        status == 429
    }

    /// Wait requested by a `Retry-After` header, if it is a number of seconds
    fn retry_after_hint(&self, header: Option<&str>) -> Option<Duration> {
        header
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs).min(self.max_wait))
    }

    /// Issue `request` until it succeeds or the policy gives up
    pub async fn fetch(&self, transport: &dyn HttpTransport, request: &ApiRequest) -> FetchOutcome {
        let mut transport_failures = 0;
        let mut rate_limited = 0;

        loop {
            match transport.get(request).await {
                Ok(response) if response.status == 200 => {
                    match serde_json::from_str::<Value>(&response.body) {
                        Ok(value) => {
                            debug!("{} returned a payload", request.url);
                            return FetchOutcome::Success(value);
                        }
                        Err(e) => {
                            transport_failures += 1;
                            error!(
                                "{} returned malformed JSON (attempt {}/{}): {}",
                                request.url, transport_failures, self.max_attempts, e
                            );

                            if transport_failures >= self.max_attempts {
                                return FetchOutcome::Failed(FetchFailure::Malformed(e.to_string()));
                            }

                            sleep(self.backoff(transport_failures)).await;
                        }
                    }
                }
                Ok(response) if Self::is_retryable_status(response.status) => {
                    rate_limited += 1;
                    if rate_limited > self.rate_limit_retries {
                        error!(
                            "{} still rate limited after {} retries",
                            request.url, self.rate_limit_retries
                        );
                        return FetchOutcome::Failed(FetchFailure::RateLimited);
                    }

                    let wait = self
                        .retry_after_hint(response.retry_after.as_deref())
                        .unwrap_or_else(|| self.backoff(rate_limited));
                    warn!(
                        "Rate limit hit on {} (retry {}/{}), waiting {:?}",
                        request.url, rate_limited, self.rate_limit_retries, wait
                    );
                    sleep(wait).await;
                }
                Ok(response) => {
                    let preview: String = response.body.chars().take(500).collect();
                    error!(
                        "{} failed with status {}: {}",
                        request.url, response.status, preview
                    );
                    return FetchOutcome::Failed(FetchFailure::Status(response.status));
                }
                Err(e) => {
                    transport_failures += 1;
                    error!(
                        "Request to {} failed (attempt {}/{}): {}",
                        request.url, transport_failures, self.max_attempts, e
                    );

                    if transport_failures >= self.max_attempts {
                        error!("Max retries reached for {}", request.url);
                        return FetchOutcome::Failed(FetchFailure::Transport(e.to_string()));
                    }

                    sleep(self.backoff(transport_failures)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::transport::testing::{ok, rate_limited, status, ScriptedTransport};
    use crate::market::transport::TransportError;
    use serde_json::json;
    use tokio::time::Instant;

    const URL: &str = "https://api.test/quote";

    fn request() -> ApiRequest {
        ApiRequest::new(URL).param("ticker", "AAPL")
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(6));
    }

    #[test]
    fn test_backoff_capped() {
        let policy = RetryPolicy {
            max_wait: Duration::from_secs(5),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(10), Duration::from_secs(5));
        assert_eq!(
            policy.retry_after_hint(Some("120")),
            Some(Duration::from_secs(5))
        );
        assert_eq!(policy.retry_after_hint(Some("soon")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let transport = ScriptedTransport::new();
        transport.push(URL, ok(json!({ "body": { "symbol": "AAPL" } })));

        let outcome = RetryPolicy::default().fetch(&transport, &request()).await;

        assert_eq!(outcome, FetchOutcome::Success(json!({ "body": { "symbol": "AAPL" } })));
        assert_eq!(transport.calls_to(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_rate_limits_then_success() {
        let transport = ScriptedTransport::new();
        transport
            .push(URL, rate_limited(None))
            .push(URL, rate_limited(None))
            .push(URL, rate_limited(None))
            .push(URL, ok(json!({ "data": {} })));

        let started = Instant::now();
        let outcome = RetryPolicy::default().fetch(&transport, &request()).await;

        assert_eq!(outcome.payload(), Some(json!({ "data": {} })));
        assert_eq!(transport.calls_to(URL), 4);
        // 2s + 4s + 6s of backoff
        assert!(started.elapsed() >= Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_header_respected() {
        let transport = ScriptedTransport::new();
        transport
            .push(URL, rate_limited(Some("9")))
            .push(URL, ok(json!({})));

        let started = Instant::now();
        let outcome = RetryPolicy::default().fetch(&transport, &request()).await;

        assert_eq!(outcome, FetchOutcome::Success(json!({})));
        assert!(started.elapsed() >= Duration::from_secs(9));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_budget_exhausted() {
        let transport = ScriptedTransport::new();
        for _ in 0..4 {
            transport.push(URL, rate_limited(Some("1")));
        }

        let outcome = RetryPolicy::default().fetch(&transport, &request()).await;

        assert_eq!(outcome, FetchOutcome::Failed(FetchFailure::RateLimited));
        assert_eq!(transport.calls_to(URL), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_timeouts_give_empty_result() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push(URL, Err(TransportError::Timeout));
        }
        transport.push(URL, ok(json!({ "never": "reached" })));

        let outcome = RetryPolicy::default().fetch(&transport, &request()).await;

        assert!(matches!(outcome, FetchOutcome::Failed(FetchFailure::Transport(_))));
        assert_eq!(transport.calls_to(URL), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_recovers() {
        let transport = ScriptedTransport::new();
        transport
            .push(URL, Err(TransportError::Connection("reset".to_string())))
            .push(URL, ok(json!([1, 2, 3])));

        let outcome = RetryPolicy::default().fetch(&transport, &request()).await;
        assert_eq!(outcome.payload(), Some(json!([1, 2, 3])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_status_not_retried() {
        let transport = ScriptedTransport::new();
        transport.push(URL, status(500)).push(URL, ok(json!({})));

        let outcome = RetryPolicy::default().fetch(&transport, &request()).await;

        assert_eq!(outcome, FetchOutcome::Failed(FetchFailure::Status(500)));
        assert_eq!(transport.calls_to(URL), 1);
    }

    fn html_page() -> crate::market::transport::testing::Scripted {
        Ok(crate::market::transport::RawResponse {
            status: 200,
            retry_after: None,
            body: "<html>".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body_exhausts_attempts() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push(URL, html_page());
        }

        let outcome = RetryPolicy::default().fetch(&transport, &request()).await;

        assert!(matches!(outcome, FetchOutcome::Failed(FetchFailure::Malformed(_))));
        assert_eq!(transport.calls_to(URL), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body_then_payload() {
        let transport = ScriptedTransport::new();
        transport.push(URL, html_page()).push(URL, ok(json!({ "body": [] })));

        let started = Instant::now();
        let outcome = RetryPolicy::default().fetch(&transport, &request()).await;

        assert_eq!(outcome.payload(), Some(json!({ "body": [] })));
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
