//! Core data models for market data

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

//
// ================= Metric =================
//

/// A single field of a ticker record.
///
/// Missing data is an explicit value rather than an absent key, so
/// formatting code never has to special-case it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Number(Number),
    Text(String),
    #[default]
    NotAvailable,
}

impl Metric {
    pub const SENTINEL: &'static str = "N/A";

    /// Convert a raw JSON value; null, arrays and objects become `NotAvailable`
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => Metric::Number(n.clone()),
            Value::String(s) => Metric::Text(s.clone()),
            Value::Bool(b) => Metric::Text(b.to_string()),
            _ => Metric::NotAvailable,
        }
    }

    pub fn from_optional(value: Option<&Value>) -> Self {
        value.map(Metric::from_json).unwrap_or_default()
    }

    pub fn text(value: impl Into<String>) -> Self {
        Metric::Text(value.into())
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Metric::NotAvailable)
    }

}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Number(n) => write!(f, "{}", n),
            Metric::Text(s) => write!(f, "{}", s),
            Metric::NotAvailable => write!(f, "{}", Self::SENTINEL),
        }
    }
}

//
// ================= Ticker list =================
//

/// One entry of the ticker-list API's `body` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerListing {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lastsale: Option<Value>,
    #[serde(default)]
    pub pctchange: Option<Value>,
}

//
// ================= ESG =================
//

/// ESG scores as pre-formatted strings from the ESG API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgScores {
    pub total: Metric,
    pub environment: Metric,
    pub social: Metric,
    pub governance: Metric,
}

impl EsgScores {
    /// Decode an ESG payload; `None` unless `totalEsg` is present
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let total = payload.get("totalEsg")?;
        let fmt_of = |value: Option<&Value>| Metric::from_optional(value.and_then(|v| v.get("fmt")));

        Some(Self {
            total: fmt_of(Some(total)),
            environment: fmt_of(payload.get("environmentScore")),
            social: fmt_of(payload.get("socialScore")),
            governance: fmt_of(payload.get("governanceScore")),
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "ESG Score: {}, Environmental: {}, Social: {}, Governance: {}",
            self.total, self.environment, self.social, self.governance
        )
    }
}

//
// ================= Merged record =================
//

/// Normalized view of one ticker built from the list and quote APIs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MergedTickerRecord {
    pub symbol: Metric,
    pub name: Metric,
    pub price: Metric,
    pub change_pct: Metric,
    pub open: Metric,
    pub high: Metric,
    pub low: Metric,
    pub volume: Metric,
    pub market_cap: Metric,
    pub week52_high: Metric,
    pub week52_low: Metric,
    pub sector: Metric,
    pub industry: Metric,
    pub esg_total: Metric,
    pub esg_environment: Metric,
    pub esg_social: Metric,
    pub esg_governance: Metric,
}

impl MergedTickerRecord {
    /// True when neither source contributed anything
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copy of this record with ESG scores attached
    pub fn with_esg(self, esg: &EsgScores) -> Self {
        Self {
            esg_total: esg.total.clone(),
            esg_environment: esg.environment.clone(),
            esg_social: esg.social.clone(),
            esg_governance: esg.governance.clone(),
            ..self
        }
    }

    pub fn has_esg(&self) -> bool {
        self.esg_total.is_available()
    }

    /// Attached ESG scores, if any
    pub fn esg(&self) -> Option<EsgScores> {
        self.has_esg().then(|| EsgScores {
            total: self.esg_total.clone(),
            environment: self.esg_environment.clone(),
            social: self.esg_social.clone(),
            governance: self.esg_governance.clone(),
        })
    }

    /// Symbol as text, falling back to `fallback` when unknown
    pub fn symbol_or(&self, fallback: &str) -> String {
        if self.symbol.is_available() {
            self.symbol.to_string()
        } else {
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_display() {
        assert_eq!(Metric::from_json(&json!(105)).to_string(), "105");
        assert_eq!(Metric::from_json(&json!("$187.20")).to_string(), "$187.20");
        assert_eq!(Metric::from_json(&Value::Null).to_string(), "N/A");
        assert_eq!(Metric::from_json(&json!([1, 2])), Metric::NotAvailable);
    }

    #[test]
    fn test_esg_requires_total() {
        assert!(EsgScores::from_payload(&json!({ "socialScore": { "fmt": "5.1" } })).is_none());

        let esg = EsgScores::from_payload(&json!({
            "totalEsg": { "raw": 17.2, "fmt": "17.2" },
            "environmentScore": { "fmt": "0.6" },
            "socialScore": { "fmt": "7.4" }
        }))
        .unwrap();

        assert_eq!(
            esg.summary(),
            "ESG Score: 17.2, Environmental: 0.6, Social: 7.4, Governance: N/A"
        );
    }

    #[test]
    fn test_default_record_is_empty() {
        let record = MergedTickerRecord::default();
        assert!(record.is_empty());
        assert_eq!(record.volume, Metric::NotAvailable);
        assert_eq!(record.symbol_or("AAPL"), "AAPL");
        assert!(record.esg().is_none());
    }

    #[test]
    fn test_with_esg_keeps_market_fields() {
        let record = MergedTickerRecord {
            symbol: Metric::text("AAPL"),
            price: Metric::from_json(&json!(105)),
            ..MergedTickerRecord::default()
        };
        let esg = EsgScores::from_payload(&json!({ "totalEsg": { "fmt": "17.2" } })).unwrap();

        let enriched = record.clone().with_esg(&esg);

        assert!(!record.has_esg());
        assert!(enriched.has_esg());
        assert_eq!(enriched.price, record.price);
        assert_eq!(enriched.esg_total, Metric::text("17.2"));
        assert_eq!(enriched.esg_governance, Metric::NotAvailable);
        assert_eq!(enriched.esg(), Some(esg));
    }
}
