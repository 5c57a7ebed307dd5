//! Quote store access port trait.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::error::MarketError;
use crate::domain::quote::Quote;

pub trait QuotePort {
    /// Quotes for `symbol` with `start <= date <= end`, date ascending.
    fn fetch_quotes(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Quote>, MarketError>;

    /// Most recent stored quote for `symbol`.
    fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketError>;

    fn list_symbols(&self) -> Result<Vec<String>, MarketError>;

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketError>;

    /// Latest close per symbol. Symbols without any stored quote are left out
    /// of the map rather than reported as errors.
    fn latest_closes(&self, symbols: &[String]) -> Result<HashMap<String, f64>, MarketError> {
        let mut prices = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            if prices.contains_key(symbol) {
                continue;
            }
            if let Some(quote) = self.latest_quote(symbol)? {
                prices.insert(symbol.clone(), quote.close);
            }
        }
        Ok(prices)
    }
}
