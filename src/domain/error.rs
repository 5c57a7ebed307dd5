//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for market-analyzer.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("invalid range: start {start} must be before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid symbol: {symbol:?}")]
    InvalidSymbol { symbol: String },

    #[error("invalid threshold price {value}: must be a finite positive number")]
    InvalidThreshold { value: f64 },

    #[error("invalid position for {instrument}: quantity {quantity} and avg_open_price {avg_open_price} must be finite")]
    InvalidQuantityOrPrice {
        instrument: String,
        quantity: f64,
        avg_open_price: f64,
    },

    #[error("alert {id} not found")]
    NotFound { id: u64 },

    #[error("no position for {symbol}")]
    MissingPosition { symbol: String },

    #[error("no data for {symbol} in the requested range")]
    NoDataForSymbol { symbol: String },

    #[error("no current price for {symbol}")]
    MissingPrice { symbol: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MarketError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        MarketError::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// True for errors caused by caller input rather than the environment.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MarketError::InvalidRequest { .. }
                | MarketError::InvalidRange { .. }
                | MarketError::InvalidSymbol { .. }
                | MarketError::InvalidThreshold { .. }
                | MarketError::InvalidQuantityOrPrice { .. }
                | MarketError::NotFound { .. }
                | MarketError::MissingPosition { .. }
                | MarketError::NoDataForSymbol { .. }
                | MarketError::MissingPrice { .. }
        )
    }
}

impl From<&MarketError> for std::process::ExitCode {
    fn from(err: &MarketError) -> Self {
        let code: u8 = match err {
            MarketError::Io(_) => 1,
            MarketError::ConfigParse { .. }
            | MarketError::ConfigMissing { .. }
            | MarketError::ConfigInvalid { .. } => 2,
            MarketError::Database { .. } | MarketError::DatabaseQuery { .. } => 3,
            MarketError::InvalidRequest { .. }
            | MarketError::InvalidRange { .. }
            | MarketError::InvalidSymbol { .. }
            | MarketError::InvalidThreshold { .. }
            | MarketError::InvalidQuantityOrPrice { .. } => 4,
            MarketError::NotFound { .. }
            | MarketError::MissingPosition { .. }
            | MarketError::NoDataForSymbol { .. }
            | MarketError::MissingPrice { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
