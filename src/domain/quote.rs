//! Daily OHLCV quote representation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day for one symbol.
///
/// Serializes without `symbol`: on the wire quotes are grouped under their
/// symbol (`{symbol, quotes: [...]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(skip)]
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Quote {
    /// Closes usable by the indicator engine: non-finite or non-positive
    /// closes are reported as missing.
    pub fn usable_close(&self) -> Option<f64> {
        if self.close.is_finite() && self.close > 0.0 {
            Some(self.close)
        } else {
            None
        }
    }
}

/// Returns `true` when dates are strictly increasing.
pub fn is_strictly_ordered(quotes: &[Quote]) -> bool {
    quotes.windows(2).all(|w| w[0].date < w[1].date)
}
