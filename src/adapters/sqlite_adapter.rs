//! SQLite quote store adapter.

use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, Row, params};

use crate::domain::error::MarketError;
use crate::domain::quote::Quote;
use crate::ports::quote_port::QuotePort;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> MarketError {
    MarketError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> MarketError {
    MarketError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            raw.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn quote_from_row(row: &Row<'_>) -> Result<Quote, rusqlite::Error> {
    let date: String = row.get(1)?;
    Ok(Quote {
        symbol: row.get(0)?,
        date: parse_date(&date)?,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        volume: row.get(6)?,
    })
}

impl SqliteAdapter {
    pub fn open(path: &str, pool_size: u32) -> Result<Self, MarketError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(pool_error)?;
        tracing::debug!(path, pool_size, "sqlite pool opened");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, MarketError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, MarketError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), MarketError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS quotes (
                    symbol TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (symbol, date)
                );
                CREATE INDEX IF NOT EXISTS idx_quotes_date ON quotes(date);",
            )
            .map_err(query_error)
    }

    /// Insert quotes in one transaction; an existing (symbol, date) row is
    /// replaced.
    pub fn insert_quotes(&self, quotes: &[Quote]) -> Result<usize, MarketError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for quote in quotes {
            tx.execute(
                "INSERT OR REPLACE INTO quotes (symbol, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    quote.symbol,
                    quote.date.format(DATE_FORMAT).to_string(),
                    quote.open,
                    quote.high,
                    quote.low,
                    quote.close,
                    quote.volume
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        tracing::debug!(rows = quotes.len(), "quotes stored");
        Ok(quotes.len())
    }
}

impl QuotePort for SqliteAdapter {
    fn fetch_quotes(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Quote>, MarketError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, open, high, low, close, volume
                 FROM quotes
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                quote_from_row,
            )
            .map_err(query_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketError> {
        self.conn()?
            .query_row(
                "SELECT symbol, date, open, high, low, close, volume
                 FROM quotes WHERE symbol = ?1
                 ORDER BY date DESC LIMIT 1",
                params![symbol],
                quote_from_row,
            )
            .optional()
            .map_err(query_error)
    }

    fn list_symbols(&self) -> Result<Vec<String>, MarketError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM quotes ORDER BY symbol")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(query_error)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_error)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketError> {
        let (min, max, count): (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM quotes WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => Ok(Some((
                parse_date(&min).map_err(query_error)?,
                parse_date(&max).map_err(query_error)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn quote(symbol: &str, d: NaiveDate, close: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            date: d,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1_000.0,
        }
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_quotes(&[
                quote("AAPL", date(1, 2), 185.0),
                quote("AAPL", date(1, 3), 184.0),
                quote("AAPL", date(1, 4), 182.5),
                quote("MSFT", date(1, 2), 370.0),
            ])
            .unwrap();
        adapter
    }

    #[test]
    fn schema_is_idempotent() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_quotes_in_range_ascending() {
        let adapter = seeded();
        let quotes = adapter.fetch_quotes("AAPL", date(1, 3), date(1, 31)).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].date, date(1, 3));
        assert_eq!(quotes[1].close, 182.5);
        assert_eq!(quotes[0].symbol, "AAPL");
    }

    #[test]
    fn insert_replaces_same_day() {
        let adapter = seeded();
        adapter
            .insert_quotes(&[quote("AAPL", date(1, 2), 999.0)])
            .unwrap();
        let quotes = adapter.fetch_quotes("AAPL", date(1, 2), date(1, 2)).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].close, 999.0);
    }

    #[test]
    fn latest_quote_picks_newest() {
        let adapter = seeded();
        let latest = adapter.latest_quote("AAPL").unwrap().unwrap();
        assert_eq!(latest.date, date(1, 4));
        assert!(adapter.latest_quote("TSLA").unwrap().is_none());
    }

    #[test]
    fn latest_closes_skips_unknown() {
        let adapter = seeded();
        let prices = adapter
            .latest_closes(&["AAPL".to_string(), "TSLA".to_string()])
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["AAPL"], 182.5);
    }

    #[test]
    fn list_symbols_sorted() {
        assert_eq!(seeded().list_symbols().unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn data_range() {
        let adapter = seeded();
        assert_eq!(
            adapter.get_data_range("AAPL").unwrap(),
            Some((date(1, 2), date(1, 4), 3))
        );
        assert!(adapter.get_data_range("TSLA").unwrap().is_none());
    }

    #[test]
    fn open_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("quotes.db");
        let adapter = SqliteAdapter::open(path.to_str().unwrap(), 2).unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_quotes(&[quote("AAPL", date(2, 1), 190.0)])
            .unwrap();
        assert!(path.exists());
        assert_eq!(adapter.list_symbols().unwrap(), vec!["AAPL"]);
    }
}
