#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use market_analyzer::domain::error::MarketError;
pub use market_analyzer::domain::quote::Quote;
use market_analyzer::ports::quote_port::QuotePort;
use std::collections::HashMap;

pub struct MockQuotePort {
    pub data: HashMap<String, Vec<Quote>>,
    pub errors: HashMap<String, String>,
}

impl MockQuotePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_quotes(mut self, symbol: &str, quotes: Vec<Quote>) -> Self {
        self.data.insert(symbol.to_string(), quotes);
        self
    }

    pub fn with_closes(self, symbol: &str, start: &str, closes: &[f64]) -> Self {
        let quotes = closes_to_quotes(symbol, start, closes);
        self.with_quotes(symbol, quotes)
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check_error(&self, symbol: &str) -> Result<(), MarketError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(MarketError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl QuotePort for MockQuotePort {
    fn fetch_quotes(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Quote>, MarketError> {
        self.check_error(symbol)?;
        Ok(self
            .data
            .get(symbol)
            .map(|quotes| {
                quotes
                    .iter()
                    .filter(|q| q.date >= start_date && q.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketError> {
        self.check_error(symbol)?;
        Ok(self.data.get(symbol).and_then(|q| q.last().cloned()))
    }

    fn list_symbols(&self) -> Result<Vec<String>, MarketError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketError> {
        self.check_error(symbol)?;
        match self.data.get(symbol) {
            Some(quotes) if !quotes.is_empty() => {
                let first = quotes[0].date;
                let last = quotes[quotes.len() - 1].date;
                Ok(Some((first, last, quotes.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_quote(symbol: &str, day: &str, close: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        date: date(day),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 10_000.0,
    }
}

/// One quote per calendar day starting at `start`.
pub fn closes_to_quotes(symbol: &str, start: &str, closes: &[f64]) -> Vec<Quote> {
    let first = date(start);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Quote {
            symbol: symbol.to_string(),
            date: first + Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 10_000.0,
        })
        .collect()
}

/// `count` daily quotes drifting upward from `base_price`.
pub fn generate_quotes(symbol: &str, start: &str, count: usize, base_price: f64) -> Vec<Quote> {
    let closes: Vec<f64> = (0..count)
        .map(|i| base_price + (i as f64) * 0.5 + ((i % 5) as f64 - 2.0) * 0.25)
        .collect();
    closes_to_quotes(symbol, start, &closes)
}
