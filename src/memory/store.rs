//! Conversation context storage
//!
//! Tracks what a single session has talked about: the last few
//! interactions, every symbol mentioned so far and the most recent one.

use crate::classifier::QueryClassifier;
use crate::memory::cache::{Clock, SystemClock, TickerCache};
use crate::models::MergedTickerRecord;
use crate::symbols::extract_symbols;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Interactions included in the prompt summary
const SUMMARY_INTERACTIONS: usize = 3;
/// Answers longer than this are cut in the summary
const SUMMARY_ANSWER_LIMIT: usize = 200;

/// One question/answer exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub user_query: String,
    pub bot_response: String,
    pub detected_symbols: Vec<String>,
}

/// What the context knows that is relevant to a new query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantContext {
    pub active_symbol: Option<String>,
    pub detected_symbols: Vec<String>,
    pub latest_symbol: Option<String>,
    pub mentioned_symbols: Vec<String>,
    pub recent_summary: String,
}

impl RelevantContext {
    /// True when the active symbol was inferred rather than named
    pub fn active_from_reference(&self) -> bool {
        self.detected_symbols.is_empty() && self.active_symbol.is_some()
    }
}

/// Context for a single chat session
#[derive(Debug)]
pub struct ConversationContext {
    max_history: usize,
    history: VecDeque<Interaction>,
    mentioned_symbols: HashMap<String, DateTime<Utc>>,
    latest_symbol: Option<String>,
    ticker_cache: TickerCache<MergedTickerRecord>,
    clock: Arc<dyn Clock>,
    created_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(max_history: usize) -> Self {
        Self::with_clock(max_history, Arc::new(SystemClock))
    }

    pub fn with_clock(max_history: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_history: max_history.max(1),
            history: VecDeque::with_capacity(max_history + 1),
            mentioned_symbols: HashMap::new(),
            latest_symbol: None,
            ticker_cache: TickerCache::new(clock.clone()),
            created_at: clock.now(),
            clock,
        }
    }

    /// Append an interaction and update symbol tracking.
    ///
    /// When several symbols are given the last one becomes `latest_symbol`.
    pub fn record_interaction(&mut self, user_query: &str, bot_response: &str, symbols: &[String]) {
        let timestamp = self.clock.now();

        self.history.push_back(Interaction {
            timestamp,
            user_query: user_query.to_string(),
            bot_response: bot_response.to_string(),
            detected_symbols: symbols.to_vec(),
        });

        while self.history.len() > self.max_history {
            self.history.pop_front();
        }

        for symbol in symbols {
            self.mentioned_symbols.insert(symbol.clone(), timestamp);
            self.latest_symbol = Some(symbol.clone());
        }
    }

    /// Work out which symbol a new query is about.
    ///
    /// The first symbol named in the query wins. Without one, the latest
    /// symbol is used if the query reads like a back-reference.
    pub fn resolve_context(&self, query: &str) -> RelevantContext {
        let detected_symbols = extract_symbols(query);

        let active_symbol = if QueryClassifier::resolve_reference(query) {
            self.latest_symbol.clone()
        } else {
            detected_symbols.first().cloned()
        };

        RelevantContext {
            active_symbol,
            detected_symbols,
            latest_symbol: self.latest_symbol.clone(),
            mentioned_symbols: self.mentioned_symbols.keys().cloned().collect(),
            recent_summary: self.recent_summary(),
        }
    }

    /// Last few interactions rendered for the prompt
    pub fn recent_summary(&self) -> String {
        if self.history.is_empty() {
            return "No previous conversation.".to_string();
        }

        let skip = self.history.len().saturating_sub(SUMMARY_INTERACTIONS);
        let mut lines = Vec::with_capacity(SUMMARY_INTERACTIONS * 2);

        for (i, interaction) in self.history.iter().skip(skip).enumerate() {
            lines.push(format!("Q{}: {}", i + 1, interaction.user_query));
            lines.push(format!("A{}: {}", i + 1, truncate_answer(&interaction.bot_response)));
        }

        lines.join("\n")
    }

    pub fn cache_put(&mut self, symbol: &str, payload: MergedTickerRecord) {
        self.ticker_cache.put(symbol, payload);
    }

    pub fn cache_get(&self, symbol: &str, ttl: Duration) -> Option<MergedTickerRecord> {
        self.ticker_cache.get(symbol, ttl)
    }

    pub fn history(&self) -> impl Iterator<Item = &Interaction> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn latest_symbol(&self) -> Option<&str> {
        self.latest_symbol.as_deref()
    }

    pub fn last_mentioned(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.mentioned_symbols.get(symbol).copied()
    }

    /// Time of the latest interaction, or creation for a fresh context
    pub fn last_active(&self) -> DateTime<Utc> {
        self.history
            .back()
            .map(|interaction| interaction.timestamp)
            .unwrap_or(self.created_at)
    }
}

fn truncate_answer(answer: &str) -> String {
    if answer.chars().count() > SUMMARY_ANSWER_LIMIT {
        let head: String = answer.chars().take(SUMMARY_ANSWER_LIMIT - 3).collect();
        format!("{}...", head)
    } else {
        answer.to_string()
    }
}
