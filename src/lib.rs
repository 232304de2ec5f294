//! ESG Finance Assistant
//!
//! A conversational assistant for sustainable investing:
//! - Extracts ticker symbols and resolves "it"/"that stock" to the last one
//! - Pulls ticker listings, real-time quotes and ESG scores with retry/backoff
//! - Caches merged ticker data per session with a TTL
//! - Composes prompts for a locally served language model
//! - Screens a stock dataset from natural-language criteria via Gemini + SQL
//!
//! TURN:
//! MESSAGE → RESOLVE SYMBOL → FETCH/CACHE → MERGE → PROMPT → GENERATE → RECORD

pub mod api;
pub mod classifier;
pub mod composer;
pub mod config;
pub mod conversational;
pub mod error;
pub mod gemini;
pub mod llm;
pub mod market;
pub mod memory;
pub mod models;
pub mod screener;
pub mod symbols;

#[cfg(test)]
pub(crate) mod testing;

pub use error::Result;

// Re-export common types
pub use classifier::{QueryClassifier, QueryIntent};
pub use conversational::{ChatReply, FinanceChatbot};
pub use models::*;
