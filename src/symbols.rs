//! Ticker symbol extraction
//!
//! Scans free text for uppercase runs that look like ticker symbols.
//! Short English words that happen to match the pattern are dropped.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SYMBOL_PATTERN: Regex =
        Regex::new(r"\b([A-Z]{1,5})\b").expect("symbol pattern is a valid regex");
}

/// Uppercase words that are never treated as tickers
pub const STOP_WORDS: &[&str] = &[
    "A", "I", "AM", "PM", "AN", "BY", "IF", "IS", "IT", "ME", "MY", "NO", "OK", "ON", "OR", "SO",
    "TO", "UP", "US", "WE", "AS", "AT", "BE", "DO", "GO", "HE", "HI", "IN",
];

/// Extract candidate ticker symbols in order of appearance (duplicates kept)
pub fn extract_symbols(text: &str) -> Vec<String> {
    SYMBOL_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|token| token.len() >= 2 && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_in_order() {
        let symbols = extract_symbols("Compare AAPL with MSFT and then AAPL again");
        assert_eq!(symbols, vec!["AAPL", "MSFT", "AAPL"]);
    }

    #[test]
    fn test_drops_stop_words_and_single_letters() {
        let symbols = extract_symbols("I AM OK, is IT a buy? X marks TSLA");
        assert_eq!(symbols, vec!["TSLA"]);
    }

    #[test]
    fn test_ignores_lowercase_and_long_runs() {
        assert!(extract_symbols("what about apple stock").is_empty());
        assert!(extract_symbols("GOOGLE is six letters").is_empty());
    }

    #[test]
    fn test_possessive_keeps_symbol() {
        assert_eq!(extract_symbols("What is AAPL's price"), vec!["AAPL"]);
    }

    #[test]
    fn test_never_returns_short_or_stop_tokens() {
        let samples = [
            "A B C D",
            "I AM HE WE US",
            "GO TO IN AT BY NVDA",
            "OK so AMD vs INTC?",
            "",
        ];
        for sample in samples {
            for token in extract_symbols(sample) {
                assert!(token.len() >= 2, "{} too short", token);
                assert!(!STOP_WORDS.contains(&token.as_str()), "{} is a stop word", token);
            }
        }
    }
}
