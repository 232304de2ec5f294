//! Query classification
//!
//! Keyword heuristics over the raw user query:
//! - Back-references: does the query talk about something mentioned earlier?
//! - Intent: investment advice vs. general analysis
//! - Comparison: does the user want other tickers pulled in?

use crate::symbols::extract_symbols;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    InvestmentAdvice,
    GeneralAnalysis,
}

/// Static keyword lists
const REFERRING_PHRASES: &[&str] = &[
    // Pronouns
    "it", "its", "this", "that", "they", "them",
    // Explicit references
    "this stock", "that stock", "this company", "that company",
    "the stock", "the company", "the above", "mentioned", "previous", "above",
    // Investment follow-ups
    "invest in", "buying", "selling", "worth", "good investment",
    "dividend", "price", "target", "performance", "should i buy",
];

const INVESTMENT_KEYWORDS: &[&str] = &[
    "invest", "buy", "sell", "worth", "stock", "good investment",
    "should i", "portfolio", "holding", "position",
];

const COMPARISON_KEYWORDS: &[&str] = &[
    "compare", "versus", "vs", "against", "other stocks", "alternatives",
    "competitors", "similar companies", "sector performance",
];

/// Query classifier
pub struct QueryClassifier;

impl QueryClassifier {
    /// Whether the query plausibly refers to an entity already in context.
    ///
    /// Plain substring matching: "it" also fires inside "with". False
    /// positives only cost an extra lookup of the previous symbol.
    pub fn refers_to_previous(query: &str) -> bool {
        contains_any(&query.to_lowercase(), REFERRING_PHRASES)
    }

    /// Like [`refers_to_previous`](Self::refers_to_previous), but a query
    /// that names its own symbol never needs one inferred.
    pub fn resolve_reference(query: &str) -> bool {
        extract_symbols(query).is_empty() && Self::refers_to_previous(query)
    }

    pub fn intent(query: &str) -> QueryIntent {
        if contains_any(&query.to_lowercase(), INVESTMENT_KEYWORDS) {
            QueryIntent::InvestmentAdvice
        } else {
            QueryIntent::GeneralAnalysis
        }
    }

    pub fn wants_comparison(query: &str) -> bool {
        contains_any(&query.to_lowercase(), COMPARISON_KEYWORDS)
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}
