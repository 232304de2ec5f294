//! Real-time quote payloads
//!
//! The quote API nests its record under either `data` or `body` depending
//! on the endpoint version. Both shapes are normalized here, before any
//! merge logic sees them.

use serde::Deserialize;
use serde_json::Value;

/// Fields consumed from a real-time quote; everything is optional upstream
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeQuote {
    pub symbol: Option<Value>,
    pub long_name: Option<Value>,
    pub regular_market_price: Option<Value>,
    pub regular_market_change_percent: Option<Value>,
    pub regular_market_open: Option<Value>,
    pub regular_market_day_high: Option<Value>,
    pub regular_market_day_low: Option<Value>,
    pub regular_market_volume: Option<Value>,
    pub market_cap: Option<Value>,
    pub fifty_two_week_high: Option<Value>,
    pub fifty_two_week_low: Option<Value>,
    pub sector: Option<Value>,
    pub industry: Option<Value>,
}

/// The two known response shapes, tried in order
#[derive(Debug, Clone, Copy)]
enum QuoteEnvelope<'a> {
    Data(&'a Value),
    Body(&'a Value),
}

impl<'a> QuoteEnvelope<'a> {
    /// `data`/`body` only count when they hold an object; a list under
    /// `body` is a ticker page, not a quote
    fn detect(payload: &'a Value) -> Option<Self> {
        let object_at = |key: &str| payload.get(key).filter(|v| v.is_object());

        object_at("data")
            .map(QuoteEnvelope::Data)
            .or_else(|| object_at("body").map(QuoteEnvelope::Body))
    }

    fn inner(self) -> &'a Value {
        match self {
            QuoteEnvelope::Data(value) | QuoteEnvelope::Body(value) => value,
        }
    }
}

impl RealtimeQuote {
    /// Pull the quote object out of a raw response, if either shape matches
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let envelope = QuoteEnvelope::detect(payload)?;

        match serde_json::from_value::<RealtimeQuote>(envelope.inner().clone()) {
            Ok(quote) => Some(quote),
            Err(e) => {
                tracing::warn!("Unrecognized quote payload ({:?}): {}", envelope, e);
                None
            }
        }
    }

    /// Change percent as shown to users: `1.23%` for numbers, text as-is
    pub fn formatted_change_percent(&self) -> Option<String> {
        match self.regular_market_change_percent.as_ref()? {
            Value::Number(n) => n.as_f64().map(|pct| format!("{:.2}%", pct)),
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_shape() {
        let quote = RealtimeQuote::from_payload(&json!({
            "meta": { "version": "v1" },
            "data": { "symbol": "AAPL", "regularMarketPrice": 105 }
        }))
        .unwrap();

        assert_eq!(quote.symbol, Some(json!("AAPL")));
        assert_eq!(quote.regular_market_price, Some(json!(105)));
    }

    #[test]
    fn test_body_shape() {
        let quote = RealtimeQuote::from_payload(&json!({
            "body": { "longName": "Microsoft Corporation", "fiftyTwoWeekHigh": 468.35 }
        }))
        .unwrap();

        assert_eq!(quote.long_name, Some(json!("Microsoft Corporation")));
        assert_eq!(quote.fifty_two_week_high, Some(json!(468.35)));
    }

    #[test]
    fn test_data_not_object_falls_back_to_body() {
        let quote = RealtimeQuote::from_payload(&json!({
            "data": ["unexpected"],
            "body": { "symbol": "TSLA" }
        }))
        .unwrap();

        assert_eq!(quote.symbol, Some(json!("TSLA")));
    }

    #[test]
    fn test_unknown_shapes() {
        assert!(RealtimeQuote::from_payload(&json!({ "body": [] })).is_none());
        assert!(RealtimeQuote::from_payload(&json!({ "result": {} })).is_none());
        assert!(RealtimeQuote::from_payload(&json!("text")).is_none());
    }

    #[test]
    fn test_change_percent_formatting() {
        let numeric = RealtimeQuote {
            regular_market_change_percent: Some(json!(1.2345)),
            ..RealtimeQuote::default()
        };
        assert_eq!(numeric.formatted_change_percent().as_deref(), Some("1.23%"));

        let text = RealtimeQuote {
            regular_market_change_percent: Some(json!("+0.5%")),
            ..RealtimeQuote::default()
        };
        assert_eq!(text.formatted_change_percent().as_deref(), Some("+0.5%"));

        assert_eq!(RealtimeQuote::default().formatted_change_percent(), None);
    }
}
