//! Merging ticker-list and real-time quote data
//!
//! Basic listing fields go in first; a real-time quote, when one can be
//! decoded, overrides them and adds the fields only it carries.

use crate::market::quote::RealtimeQuote;
use crate::models::{MergedTickerRecord, Metric, TickerListing};
use serde_json::Value;

/// Combine a basic listing and a raw real-time payload into one record
pub fn merge_ticker_data(
    basic: Option<&TickerListing>,
    realtime: Option<&Value>,
) -> MergedTickerRecord {
    let mut record = MergedTickerRecord::default();

    if let Some(listing) = basic {
        record.symbol = Metric::text(listing.symbol.clone());
        record.price = Metric::from_optional(listing.lastsale.as_ref());
        record.change_pct = Metric::from_optional(listing.pctchange.as_ref());
        record.name = listing
            .name
            .clone()
            .map(Metric::Text)
            .unwrap_or_default();
    }

    let Some(quote) = realtime.and_then(RealtimeQuote::from_payload) else {
        return record;
    };

    override_if_present(&mut record.symbol, quote.symbol.as_ref());
    override_if_present(&mut record.price, quote.regular_market_price.as_ref());
    override_if_present(&mut record.name, quote.long_name.as_ref());

    if let Some(change) = quote.formatted_change_percent() {
        record.change_pct = Metric::Text(change);
    }

    record.open = Metric::from_optional(quote.regular_market_open.as_ref());
    record.high = Metric::from_optional(quote.regular_market_day_high.as_ref());
    record.low = Metric::from_optional(quote.regular_market_day_low.as_ref());
    record.volume = Metric::from_optional(quote.regular_market_volume.as_ref());
    record.market_cap = Metric::from_optional(quote.market_cap.as_ref());
    record.week52_high = Metric::from_optional(quote.fifty_two_week_high.as_ref());
    record.week52_low = Metric::from_optional(quote.fifty_two_week_low.as_ref());
    record.sector = Metric::from_optional(quote.sector.as_ref());
    record.industry = Metric::from_optional(quote.industry.as_ref());

    record
}

fn override_if_present(field: &mut Metric, value: Option<&Value>) {
    let incoming = Metric::from_optional(value);
    if incoming.is_available() {
        *field = incoming;
    }
}
