//! Request and response bodies of the JSON API.
//!
//! Field names are the wire contract shared with the dashboard UI.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::alert::{AlertCondition, TriggeredAlert};
use crate::domain::indicator::IndicatorPoint;
use crate::domain::quote::Quote;

#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub symbol: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SymbolParams {
    pub symbol: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SmaParams {
    pub symbol: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub window: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompareParams {
    pub symbols: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    pub level: Option<String>,
    pub source: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub symbol: String,
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentQuoteResponse {
    pub symbol: String,
    pub quote: Quote,
}

#[derive(Debug, Serialize)]
pub struct SmaResponse {
    pub symbol: String,
    pub window: usize,
    pub values: Vec<IndicatorPoint>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    pub symbol: String,
    pub condition: AlertCondition,
    pub threshold_price: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub prices: Option<HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub symbol: String,
    pub quantity: f64,
    pub avg_open_price: f64,
}

/// Result of an alert check.
///
/// Served as `{"triggered": [...]}`. Older servers answered with a bare
/// array, so both shapes deserialize into the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CheckResponseWire")]
pub struct CheckResponse {
    pub triggered: Vec<TriggeredAlert>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CheckResponseWire {
    Wrapped { triggered: Vec<TriggeredAlert> },
    Bare(Vec<TriggeredAlert>),
}

impl From<CheckResponseWire> for CheckResponse {
    fn from(wire: CheckResponseWire) -> Self {
        match wire {
            CheckResponseWire::Wrapped { triggered } | CheckResponseWire::Bare(triggered) => {
                CheckResponse { triggered }
            }
        }
    }
}

/// Dates on the query string are `YYYY-MM-DD`.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{field} must be a date in YYYY-MM-DD format, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str = r#"{"id":1,"symbol":"AAPL","condition":"above","threshold_price":150.0,"current_price":151.0}"#;

    #[test]
    fn check_response_accepts_wrapped_shape() {
        let parsed: CheckResponse = serde_json::from_str(&format!(r#"{{"triggered":[{ONE}]}}"#)).unwrap();
        assert_eq!(parsed.triggered.len(), 1);
        assert_eq!(parsed.triggered[0].symbol, "AAPL");
    }

    #[test]
    fn check_response_accepts_bare_array() {
        let parsed: CheckResponse = serde_json::from_str(&format!("[{ONE}]")).unwrap();
        assert_eq!(parsed.triggered[0].current_price, 151.0);

        let empty: CheckResponse = serde_json::from_str("[]").unwrap();
        assert!(empty.triggered.is_empty());
    }

    #[test]
    fn check_response_serializes_wrapped() {
        let json = serde_json::to_value(CheckResponse { triggered: vec![] }).unwrap();
        assert_eq!(json, serde_json::json!({ "triggered": [] }));
    }

    #[test]
    fn check_request_prices_are_optional() {
        let req: CheckRequest = serde_json::from_str("{}").unwrap();
        assert!(req.prices.is_none());
        let req: CheckRequest = serde_json::from_str(r#"{"prices":{"aapl":10.5}}"#).unwrap();
        assert_eq!(req.prices.unwrap()["aapl"], 10.5);
    }

    #[test]
    fn create_alert_accepts_legacy_condition() {
        let req: CreateAlertRequest =
            serde_json::from_str(r#"{"symbol":"aapl","condition":">","threshold_price":150}"#)
                .unwrap();
        assert_eq!(req.condition, AlertCondition::Above);
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("start", "2024-01-31").is_ok());
        assert!(parse_date("start", "31/01/2024").unwrap_err().contains("start"));
    }
}
