//! Market data access
//!
//! HTTP transport, the shared retry policy, payload decoding and the merge
//! of ticker-list and real-time quote data.

pub mod fetcher;
pub mod merge;
pub mod quote;
pub mod retry;
pub mod transport;

pub use fetcher::MarketDataFetcher;
pub use merge::merge_ticker_data;
pub use quote::RealtimeQuote;
pub use retry::{FetchFailure, FetchOutcome, RetryPolicy};
pub use transport::{ApiRequest, HttpTransport, RapidApiTransport, RawResponse, TransportError};
