//! CSV quote files and CSV exports.
//!
//! A quote directory holds one `<SYMBOL>.csv` per instrument with the header
//! `date,open,high,low,close,volume`. Blank open/high/low fall back to the
//! close and a blank volume reads as zero.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::error::MarketError;
use crate::domain::log_entry::LogEntry;
use crate::domain::quote::{Quote, is_strictly_ordered};
use crate::ports::quote_port::QuotePort;

pub const QUOTE_HEADER: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];
pub const LOG_HEADER: [&str; 6] = ["id", "timestamp", "level", "source", "message", "user_email"];

#[derive(Debug, Deserialize)]
struct QuoteRecord {
    date: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: f64,
    volume: Option<f64>,
}

impl QuoteRecord {
    fn into_quote(self, symbol: &str) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            date: self.date,
            open: self.open.unwrap_or(self.close),
            high: self.high.unwrap_or(self.close),
            low: self.low.unwrap_or(self.close),
            close: self.close,
            volume: self.volume.unwrap_or(0.0),
        }
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// The file holding `symbol`, matched case-insensitively on the stem so
    /// `aapl.csv` serves `AAPL`. `None` when the directory has no such file.
    fn csv_path(&self, symbol: &str) -> Result<Option<PathBuf>, MarketError> {
        if symbol.is_empty() || symbol.contains(['/', '\\']) || symbol.contains("..") {
            return Err(MarketError::InvalidSymbol {
                symbol: symbol.to_string(),
            });
        }
        let exact = self.base_path.join(format!("{symbol}.csv"));
        if exact.is_file() {
            return Ok(Some(exact));
        }

        let Ok(entries) = fs::read_dir(&self.base_path) else {
            return Ok(None);
        };
        Ok(entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|path| {
                path.is_file()
                    && symbol_from_path(path).is_some_and(|stem| stem.eq_ignore_ascii_case(symbol))
            }))
    }

    /// Every quote in the symbol's file, date ascending. A missing file is an
    /// unknown symbol and yields no quotes.
    pub fn load_all(&self, symbol: &str) -> Result<Vec<Quote>, MarketError> {
        let Some(path) = self.csv_path(symbol)? else {
            return Ok(Vec::new());
        };
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MarketError::Database {
                    reason: format!("failed to read {}: {e}", path.display()),
                });
            }
        };
        read_quotes(file, symbol).map_err(|e| match e {
            MarketError::Database { reason } => MarketError::Database {
                reason: format!("{}: {reason}", path.display()),
            },
            other => other,
        })
    }
}

/// Parse quote rows for `symbol`, sorting by date and keeping the last row of
/// any repeated date.
pub fn read_quotes<R: io::Read>(reader: R, symbol: &str) -> Result<Vec<Quote>, MarketError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut quotes = Vec::new();

    for (line, result) in rdr.deserialize::<QuoteRecord>().enumerate() {
        let record = result.map_err(|e| MarketError::Database {
            reason: format!("CSV parse error at row {}: {e}", line + 1),
        })?;
        quotes.push(record.into_quote(symbol));
    }

    if !is_strictly_ordered(&quotes) {
        quotes.sort_by_key(|q| q.date);
        let mut deduped: Vec<Quote> = Vec::with_capacity(quotes.len());
        for quote in quotes {
            match deduped.last_mut() {
                Some(last) if last.date == quote.date => *last = quote,
                _ => deduped.push(quote),
            }
        }
        quotes = deduped;
    }
    Ok(quotes)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, MarketError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| MarketError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| MarketError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn csv_error(e: csv::Error) -> MarketError {
    MarketError::Io(e.into())
}

/// Render quotes as CSV with a header row, also when there are no quotes.
pub fn quotes_to_csv(quotes: &[Quote]) -> Result<String, MarketError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(QUOTE_HEADER).map_err(csv_error)?;
    for q in quotes {
        writer
            .write_record([
                q.date.format("%Y-%m-%d").to_string(),
                q.open.to_string(),
                q.high.to_string(),
                q.low.to_string(),
                q.close.to_string(),
                q.volume.to_string(),
            ])
            .map_err(csv_error)?;
    }
    finish(writer)
}

pub fn log_entries_to_csv(entries: &[LogEntry]) -> Result<String, MarketError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(LOG_HEADER).map_err(csv_error)?;
    for entry in entries {
        writer
            .write_record([
                entry.id.to_string(),
                entry.timestamp.to_rfc3339(),
                entry.level.to_string(),
                entry.source.clone(),
                entry.message.clone(),
                entry.user_email.clone().unwrap_or_default(),
            ])
            .map_err(csv_error)?;
    }
    finish(writer)
}

/// Suggested download name, e.g. `AAPL_2024-01-01_2024-01-31.csv`.
pub fn export_filename(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!("{symbol}_{start}_{end}.csv")
}

fn symbol_from_path(path: &Path) -> Option<String> {
    if path.extension()?.to_str()? != "csv" {
        return None;
    }
    Some(path.file_stem()?.to_str()?.to_uppercase())
}

impl QuotePort for CsvAdapter {
    fn fetch_quotes(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Quote>, MarketError> {
        let mut quotes = self.load_all(symbol)?;
        quotes.retain(|q| q.date >= start_date && q.date <= end_date);
        Ok(quotes)
    }

    fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketError> {
        Ok(self.load_all(symbol)?.pop())
    }

    fn list_symbols(&self) -> Result<Vec<String>, MarketError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| MarketError::Database {
            reason: format!("failed to read directory {}: {e}", self.base_path.display()),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MarketError::Database {
                reason: format!("directory entry error: {e}"),
            })?;
            if let Some(symbol) = symbol_from_path(&entry.path()) {
                symbols.push(symbol);
            }
        }

        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketError> {
        let quotes = self.load_all(symbol)?;
        match (quotes.first(), quotes.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, quotes.len()))),
            _ => Ok(None),
        }
    }
}
