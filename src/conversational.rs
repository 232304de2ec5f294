//! Conversational finance chatbot
//!
//! One turn: resolve which ticker the message is about, gather market and
//! ESG data for it, compose a prompt with the recent conversation and ask
//! the local model. Every turn is recorded in the session's context so
//! follow-ups like "should I buy it?" resolve to the right symbol.

use crate::classifier::QueryClassifier;
use crate::composer::{ticker_brief, ticker_detail, PromptInput, ResponseComposer};
use crate::config::ChatConfig;
use crate::llm::{LocalCompletionClient, TextGenerator};
use crate::market::{merge_ticker_data, MarketDataFetcher};
use crate::memory::{ConversationContext, SessionStore};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Listings pulled for a comparison query without a named symbol
const COMPARISON_TICKERS: usize = 3;

const NO_SYMBOL_HINT: &str = "No specific ticker symbol detected in your query. \
Please include a stock symbol (e.g., AAPL for Apple) if you want stock information.";

/// Result of one chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    pub active_symbol: Option<String>,
    pub detected_symbols: Vec<String>,
}

pub struct FinanceChatbot {
    sessions: SessionStore,
    fetcher: MarketDataFetcher,
    generator: Arc<dyn TextGenerator>,
    composer: ResponseComposer,
    cache_ttl: Duration,
}

impl FinanceChatbot {
    pub fn new(
        sessions: SessionStore,
        fetcher: MarketDataFetcher,
        generator: Arc<dyn TextGenerator>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            sessions,
            fetcher,
            generator,
            composer: ResponseComposer::new(),
            cache_ttl,
        }
    }

    /// Chatbot wired to RapidAPI and a local completion server
    pub fn from_config(config: &ChatConfig) -> crate::Result<Self> {
        let fetcher = MarketDataFetcher::from_config(config.market.clone())?;
        let generator = LocalCompletionClient::new(&config.local_llm_url, &config.local_llm_model)?;

        Ok(Self::new(
            SessionStore::new(config.max_history).with_max_sessions(config.max_sessions),
            fetcher,
            Arc::new(generator),
            config.cache_ttl,
        ))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer one message within a session
    pub async fn respond(&self, session_id: &str, message: &str) -> ChatReply {
        let shared = self.sessions.get_or_create(session_id).await;
        let mut context = shared.lock().await;

        let relevant = context.resolve_context(message);
        let mut detected_symbols = relevant.detected_symbols.clone();
        let active_symbol = relevant.active_symbol.clone();

        if relevant.active_from_reference() {
            if let Some(symbol) = &active_symbol {
                info!("Using contextual reference to {} from previous conversation", symbol);
                detected_symbols.push(symbol.clone());
            }
        }

        let intent = QueryClassifier::intent(message);
        info!("Query intent: {:?}, detected symbols: {:?}", intent, detected_symbols);

        let mut market_summary = String::new();

        if let Some(symbol) = &active_symbol {
            market_summary.push_str(&self.describe_symbol(&mut context, symbol).await);
        }

        if active_symbol.is_none() && QueryClassifier::wants_comparison(message) {
            info!("Getting additional tickers for comparison as requested");
            market_summary.push_str(&self.describe_comparison_tickers().await);
        }

        if market_summary.is_empty() {
            warn!("No ticker data could be retrieved");
            market_summary = match &active_symbol {
                Some(symbol) => format!("No information available for {}.", symbol),
                None => NO_SYMBOL_HINT.to_string(),
            };
        }
        info!("Final ticker summary: {}", market_summary);

        let input = PromptInput {
            query: message,
            intent,
            market_summary: &market_summary,
            recent_summary: &relevant.recent_summary,
            as_of: Local::now(),
        };
        let answer = self.composer.compose(self.generator.as_ref(), &input).await;

        context.record_interaction(message, &answer, &detected_symbols);

        ChatReply {
            answer,
            active_symbol,
            detected_symbols,
        }
    }

    /// Detail line for the active symbol, from cache when fresh.
    ///
    /// Fresh merges are cached with their ESG scores attached.
    async fn describe_symbol(&self, context: &mut ConversationContext, symbol: &str) -> String {
        let (record, fetched) = match context.cache_get(symbol, self.cache_ttl) {
            Some(cached) => {
                info!("Using cached data for {}", symbol);
                (cached, false)
            }
            None => {
                let realtime = self.fetcher.realtime_quote(symbol).await;
                let listing = self
                    .fetcher
                    .search_ticker(symbol, self.fetcher.search_pages())
                    .await;

                (merge_ticker_data(listing.as_ref(), realtime.as_ref()), true)
            }
        };

        if record.is_empty() {
            warn!("No data found for active symbol: {}", symbol);
            return format!("No detailed data available for {}. ", symbol);
        }

        let record = if record.has_esg() {
            record
        } else {
            match self.fetcher.esg_scores(&record.symbol_or(symbol)).await {
                Some(esg) => record.with_esg(&esg),
                None => record,
            }
        };

        if fetched {
            context.cache_put(symbol, record.clone());
        }

        format!("{} ", ticker_detail(&record, symbol))
    }

    /// Brief lines for the first few listings of the ticker list
    async fn describe_comparison_tickers(&self) -> String {
        let mut summary = String::new();
        let listings = self.fetcher.fetch_ticker_pages(1, None).await;

        for listing in listings.iter().take(COMPARISON_TICKERS) {
            let realtime = self.fetcher.realtime_quote(&listing.symbol).await;
            let record = merge_ticker_data(Some(listing), realtime.as_ref());

            summary.push_str(&ticker_brief(&record, &listing.symbol));

            if let Some(esg) = self.fetcher.esg_scores(&listing.symbol).await {
                summary.push_str(&format!("ESG Score: {}; ", esg.total));
            }
        }

        summary
    }
}
