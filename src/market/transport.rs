//! HTTP transport for the market data APIs
//!
//! The retry policy talks to a `HttpTransport` rather than reqwest
//! directly, so status handling and backoff can be exercised without a
//! network.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A GET request against one of the market APIs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Status, `Retry-After` header and raw body of a response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

/// Failure below the HTTP layer
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport that signs requests for RapidAPI
pub struct RapidApiTransport {
    client: Client,
    api_key: String,
}

impl RapidApiTransport {
    pub fn new(api_key: String, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl HttpTransport for RapidApiTransport {
    async fn get(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let url = Url::parse(&request.url)
            .map_err(|e| TransportError::Connection(format!("invalid url {}: {}", request.url, e)))?;
        let host = url.host_str().unwrap_or_default().to_string();

        let response = self
            .client
            .get(url)
            .query(&request.query)
            .header("x-rapidapi-host", host)
            .header("x-rapidapi-key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await?;
        debug!("GET {} -> {} ({} bytes)", request.url, status, body.len());

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}
