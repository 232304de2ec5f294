//! Market data fetcher
//!
//! Wraps the three external endpoints (ticker list, real-time quote, ESG)
//! behind one shared retry policy. Every method degrades to an empty
//! result instead of failing.

use crate::config::MarketApiConfig;
use crate::market::retry::{FetchOutcome, RetryPolicy};
use crate::market::transport::{ApiRequest, HttpTransport, RapidApiTransport};
use crate::models::{EsgScores, TickerListing};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const INSTRUMENT_TYPE: &str = "STOCKS";

pub struct MarketDataFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    config: MarketApiConfig,
}

impl MarketDataFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy, config: MarketApiConfig) -> Self {
        Self {
            transport,
            policy,
            config,
        }
    }

    /// Fetcher using the RapidAPI transport and the default retry policy
    pub fn from_config(config: MarketApiConfig) -> crate::Result<Self> {
        let transport = RapidApiTransport::new(config.rapidapi_key.clone(), config.request_timeout)?;
        Ok(Self::new(Arc::new(transport), RetryPolicy::default(), config))
    }

    pub fn search_pages(&self) -> u32 {
        self.config.search_pages
    }

    async fn fetch(&self, request: ApiRequest) -> FetchOutcome {
        self.policy.fetch(self.transport.as_ref(), &request).await
    }

    /// Walk ticker-list pages `1..=max_pages`.
    ///
    /// With a `target`, stops after the first page that contains it.
    /// Pages that fail or lack a `body` list are skipped.
    pub async fn fetch_ticker_pages(&self, max_pages: u32, target: Option<&str>) -> Vec<TickerListing> {
        let mut all_tickers = Vec::new();

        for page in 1..=max_pages {
            info!("Fetching ticker page {}/{}", page, max_pages);

            let request = ApiRequest::new(&self.config.tickers_url)
                .param("page", page)
                .param("type", INSTRUMENT_TYPE);

            let Some(payload) = self.fetch(request).await.payload() else {
                warn!("Skipping ticker page {} after failed fetch", page);
                continue;
            };

            let Some(entries) = payload.get("body").and_then(Value::as_array) else {
                warn!("No 'body' list found in page {} response", page);
                continue;
            };

            let page_tickers: Vec<TickerListing> = entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect();
            debug!("Found {} tickers in page {}", page_tickers.len(), page);

            let found = target.map_or(false, |symbol| {
                page_tickers.iter().any(|ticker| ticker.symbol == symbol)
            });

            all_tickers.extend(page_tickers);

            if found {
                info!("Found target symbol on page {}", page);
                break;
            }
        }

        info!("Total tickers collected: {}", all_tickers.len());
        all_tickers
    }

    /// Look a symbol up in the ticker list
    pub async fn search_ticker(&self, symbol: &str, max_pages: u32) -> Option<TickerListing> {
        let tickers = self.fetch_ticker_pages(max_pages, Some(symbol)).await;
        let found = tickers.into_iter().find(|ticker| ticker.symbol == symbol);

        if found.is_none() {
            warn!("Ticker {} not found in {} pages", symbol, max_pages);
        }
        found
    }

    /// Raw real-time quote payload
    pub async fn realtime_quote(&self, symbol: &str) -> Option<Value> {
        info!("Fetching real-time quote for: {}", symbol);

        let request = ApiRequest::new(&self.config.quote_url)
            .param("ticker", symbol)
            .param("type", INSTRUMENT_TYPE);

        self.fetch(request).await.payload()
    }

    /// ESG scores; `None` when unavailable or the payload lacks `totalEsg`
    pub async fn esg_scores(&self, symbol: &str) -> Option<EsgScores> {
        info!("Fetching ESG data for symbol: {}", symbol);

        let url = format!("{}/{}", self.config.esg_url.trim_end_matches('/'), symbol);
        let payload = self.fetch(ApiRequest::new(url)).await.payload()?;

        let scores = EsgScores::from_payload(&payload);
        if scores.is_none() {
            warn!("No ESG data found for {}", symbol);
        }
        scores
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::market::transport::testing::ScriptedTransport;

    pub const TICKERS_URL: &str = "https://market.test/tickers";
    pub const QUOTE_URL: &str = "https://market.test/quote";
    pub const ESG_URL: &str = "https://esg.test/esg-scores";

    pub fn test_config() -> MarketApiConfig {
        MarketApiConfig {
            rapidapi_key: "test".to_string(),
            tickers_url: TICKERS_URL.to_string(),
            quote_url: QUOTE_URL.to_string(),
            esg_url: ESG_URL.to_string(),
            ..MarketApiConfig::default()
        }
    }

    pub fn fetcher(transport: Arc<ScriptedTransport>) -> MarketDataFetcher {
        MarketDataFetcher::new(transport, RetryPolicy::default(), test_config())
    }
}
