//! Prompt assembly and response generation
//!
//! Turns merged market data plus conversation context into one prompt for
//! the local model, and shields callers from generator failures.

use crate::classifier::QueryIntent;
use crate::llm::{DecodingParams, TextGenerator};
use crate::models::{MergedTickerRecord, Metric};
use chrono::{DateTime, Local};
use tracing::{debug, error, info};

pub const APOLOGY: &str = "I apologize, but I encountered an error while processing your request. \
Please try again with a different query.";

const INVESTMENT_INSTRUCTIONS: &str = "The user is asking about investment advice. Analyze the \
current market data provided below, and give a balanced assessment that considers both financial \
performance and ESG factors. Include pros and cons, potential risks, and suggest sustainable \
alternatives if appropriate. Focus on educational information rather than direct financial advice.";

const ANALYSIS_INSTRUCTIONS: &str = "Answer the following financial query by providing a detailed \
analysis based on the real-time market data below. Include relevant ESG (Environmental, Social, \
Governance) considerations and focus on clear, actionable information.";

pub fn instructions_for(intent: QueryIntent) -> &'static str {
    match intent {
        QueryIntent::InvestmentAdvice => INVESTMENT_INSTRUCTIONS,
        QueryIntent::GeneralAnalysis => ANALYSIS_INSTRUCTIONS,
    }
}

/// Everything that goes into one prompt
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub query: &'a str,
    pub intent: QueryIntent,
    pub market_summary: &'a str,
    pub recent_summary: &'a str,
    pub as_of: DateTime<Local>,
}

pub fn build_prompt(input: &PromptInput<'_>) -> String {
    format!(
        "{}\n\nUser Query: {}\n\nRecent Conversation:\n{}\n\nCurrent Market Data (as of {}):\n{}\n\nAnswer:",
        instructions_for(input.intent),
        input.query,
        input.recent_summary,
        input.as_of.format("%Y-%m-%d %H:%M:%S"),
        input.market_summary,
    )
}

/// One-line description of a ticker for the prompt.
///
/// Unavailable fields are left out; the record's ESG scores go last.
pub fn ticker_detail(record: &MergedTickerRecord, fallback_symbol: &str) -> String {
    let symbol = record.symbol_or(fallback_symbol);
    let name = if record.name.is_available() {
        record.name.to_string()
    } else {
        symbol.clone()
    };

    let mut detail = format!(
        "{} ({}): Price ${} ({})",
        symbol, name, record.price, record.change_pct
    );

    let optional: [(&str, &Metric, bool); 9] = [
        ("Open", &record.open, true),
        ("High", &record.high, true),
        ("Low", &record.low, true),
        ("Volume", &record.volume, false),
        ("Market Cap", &record.market_cap, true),
        ("52w High", &record.week52_high, true),
        ("52w Low", &record.week52_low, true),
        ("Sector", &record.sector, false),
        ("Industry", &record.industry, false),
    ];

    for (label, value, currency) in optional {
        if value.is_available() {
            let prefix = if currency { "$" } else { "" };
            detail.push_str(&format!("; {}: {}{}", label, prefix, value));
        }
    }

    match record.esg() {
        Some(scores) => detail.push_str(&format!("; {}", scores.summary())),
        None => detail.push_str("; No ESG data available"),
    }

    detail
}

/// Short line used for comparison tickers
pub fn ticker_brief(record: &MergedTickerRecord, fallback_symbol: &str) -> String {
    let symbol = record.symbol_or(fallback_symbol);
    let name = if record.name.is_available() {
        record.name.to_string()
    } else {
        symbol.clone()
    };
    format!("{} ({}): Price ${} ({}); ", symbol, name, record.price, record.change_pct)
}

/// Builds prompts and runs them through a generator
pub struct ResponseComposer {
    params: DecodingParams,
}

impl ResponseComposer {
    pub fn new() -> Self {
        Self {
            params: DecodingParams::default(),
        }
    }

    /// Generate an answer; any backend failure becomes [`APOLOGY`]
    pub async fn compose(&self, generator: &dyn TextGenerator, input: &PromptInput<'_>) -> String {
        let prompt = build_prompt(input);
        debug!("Full prompt: {}", prompt);

        match generator.generate(&prompt, &self.params).await {
            Ok(reply) => {
                info!("Successfully generated response");
                reply.trim().to_string()
            }
            Err(e) => {
                error!("Error generating response: {}", e);
                APOLOGY.to_string()
            }
        }
    }
}

impl Default for ResponseComposer {
    fn default() -> Self {
        Self::new()
    }
}
