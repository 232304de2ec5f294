//! Conversation memory
//!
//! Per-session conversation context: bounded interaction history, symbol
//! mention tracking and a time-limited ticker data cache. Sessions are
//! partitioned by key so concurrent conversations never share state.

pub mod cache;
pub mod sessions;
pub mod store;

pub use cache::{CacheEntry, Clock, SystemClock, TickerCache};
pub use sessions::SessionStore;
pub use store::{ConversationContext, Interaction, RelevantContext};
