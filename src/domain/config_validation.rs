//! Configuration validation and typed settings.
//!
//! Every key is optional; defaults apply when a key is absent. Present values
//! must be well formed, so a typo fails at startup instead of at first use.

use std::net::SocketAddr;

use chrono::Duration;

use crate::domain::error::MarketError;
use crate::domain::indicator::sma::DEFAULT_SMA_WINDOW;
use crate::domain::portfolio::{DEFAULT_BASE_CURRENCY, DEFAULT_PORTFOLIO_NAME};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_SQLITE_PATH: &str = "market.db";
pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
pub const DEFAULT_LOG_FILTER: &str = "market_analyzer=info,tower_http=info";
pub const DEFAULT_LOG_CAPACITY: usize = 1000;
/// One year.
const MAX_COOLDOWN_SECS: i64 = 31_536_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sqlite_path: String,
    pub pool_size: u32,
    pub csv_dir: Option<String>,
    pub listen: SocketAddr,
    pub portfolio_name: String,
    pub base_currency: String,
    pub alert_cooldown: Duration,
    pub default_window: usize,
    pub log_filter: String,
    pub log_capacity: usize,
}

impl Settings {
    /// Validate `config` and resolve defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MarketError> {
        validate_config(config)?;

        let listen_raw = non_blank(config, "web", "listen").unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen = parse_listen(&listen_raw)?;

        Ok(Settings {
            sqlite_path: non_blank(config, "sqlite", "path")
                .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
            pool_size: config.get_int("sqlite", "pool_size", i64::from(DEFAULT_POOL_SIZE)) as u32,
            csv_dir: non_blank(config, "csv", "dir"),
            listen,
            portfolio_name: non_blank(config, "portfolio", "name")
                .unwrap_or_else(|| DEFAULT_PORTFOLIO_NAME.to_string()),
            base_currency: non_blank(config, "portfolio", "base_currency")
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string()),
            alert_cooldown: Duration::seconds(config.get_int("alerts", "cooldown_secs", 0)),
            default_window: config.get_int("indicator", "default_window", DEFAULT_SMA_WINDOW as i64)
                as usize,
            log_filter: non_blank(config, "log", "filter")
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_capacity: config.get_int("log", "max_entries", DEFAULT_LOG_CAPACITY as i64) as usize,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            sqlite_path: DEFAULT_SQLITE_PATH.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            csv_dir: None,
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            portfolio_name: DEFAULT_PORTFOLIO_NAME.to_string(),
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            alert_cooldown: Duration::zero(),
            default_window: DEFAULT_SMA_WINDOW,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), MarketError> {
    validate_sqlite(config)?;
    validate_listen(config)?;
    validate_cooldown(config)?;
    validate_window(config)?;
    validate_log_capacity(config)?;
    validate_base_currency(config)?;
    Ok(())
}

fn non_blank(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> MarketError {
    MarketError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

// `get_int` falls back to the default on garbage, so integer keys are parsed
// here from the raw string to surface typos.
fn raw_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<i64>, MarketError> {
    match non_blank(config, section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("expected an integer, got {raw:?}"))),
    }
}

fn validate_sqlite(config: &dyn ConfigPort) -> Result<(), MarketError> {
    if let Some(raw) = config.get_string("sqlite", "path") {
        if raw.trim().is_empty() {
            return Err(MarketError::ConfigMissing {
                section: "sqlite".to_string(),
                key: "path".to_string(),
            });
        }
    }
    if let Some(size) = raw_int(config, "sqlite", "pool_size")? {
        if !(1..=64).contains(&size) {
            return Err(invalid("sqlite", "pool_size", "pool_size must be between 1 and 64"));
        }
    }
    Ok(())
}

fn parse_listen(raw: &str) -> Result<SocketAddr, MarketError> {
    raw.parse::<SocketAddr>()
        .map_err(|_| invalid("web", "listen", format!("expected host:port, got {raw:?}")))
}

fn validate_listen(config: &dyn ConfigPort) -> Result<(), MarketError> {
    match non_blank(config, "web", "listen") {
        Some(raw) => parse_listen(&raw).map(|_| ()),
        None => Ok(()),
    }
}

fn validate_cooldown(config: &dyn ConfigPort) -> Result<(), MarketError> {
    match raw_int(config, "alerts", "cooldown_secs")? {
        Some(secs) if !(0..=MAX_COOLDOWN_SECS).contains(&secs) => Err(invalid(
            "alerts",
            "cooldown_secs",
            format!("cooldown_secs must be between 0 and {MAX_COOLDOWN_SECS}"),
        )),
        _ => Ok(()),
    }
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), MarketError> {
    match raw_int(config, "indicator", "default_window")? {
        Some(window) if window <= 0 => Err(invalid(
            "indicator",
            "default_window",
            "default_window must be positive",
        )),
        _ => Ok(()),
    }
}

fn validate_log_capacity(config: &dyn ConfigPort) -> Result<(), MarketError> {
    match raw_int(config, "log", "max_entries")? {
        Some(n) if n <= 0 => Err(invalid("log", "max_entries", "max_entries must be positive")),
        _ => Ok(()),
    }
}

fn validate_base_currency(config: &dyn ConfigPort) -> Result<(), MarketError> {
    match non_blank(config, "portfolio", "base_currency") {
        Some(code) if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) => {
            Err(invalid(
                "portfolio",
                "base_currency",
                format!("expected a 3-letter currency code, got {code:?}"),
            ))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(content: &str) -> String {
        match validate_config(&make_config(content)) {
            Err(MarketError::ConfigInvalid { key, .. }) => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        let settings = Settings::from_config(&make_config("")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn full_config_is_resolved() {
        let settings = Settings::from_config(&make_config(
            r#"
[sqlite]
path = /var/lib/market/quotes.db
pool_size = 8

[csv]
dir = ./data

[web]
listen = 0.0.0.0:9000

[portfolio]
name = Retirement
base_currency = eur

[alerts]
cooldown_secs = 60

[indicator]
default_window = 50

[log]
filter = debug
max_entries = 10
"#,
        ))
        .unwrap();

        assert_eq!(settings.sqlite_path, "/var/lib/market/quotes.db");
        assert_eq!(settings.pool_size, 8);
        assert_eq!(settings.csv_dir.as_deref(), Some("./data"));
        assert_eq!(settings.listen.port(), 9000);
        assert_eq!(settings.portfolio_name, "Retirement");
        assert_eq!(settings.base_currency, "EUR");
        assert_eq!(settings.alert_cooldown, Duration::seconds(60));
        assert_eq!(settings.default_window, 50);
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.log_capacity, 10);
    }

    #[test]
    fn pool_size_out_of_range() {
        assert_eq!(invalid_key("[sqlite]\npool_size = 0\n"), "pool_size");
        assert_eq!(invalid_key("[sqlite]\npool_size = 100\n"), "pool_size");
    }

    #[test]
    fn listen_must_be_socket_address() {
        assert_eq!(invalid_key("[web]\nlisten = localhost\n"), "listen");
    }

    #[test]
    fn negative_cooldown_fails() {
        assert_eq!(invalid_key("[alerts]\ncooldown_secs = -1\n"), "cooldown_secs");
    }

    #[test]
    fn oversized_cooldown_fails() {
        assert_eq!(
            invalid_key("[alerts]\ncooldown_secs = 9223372036854775807\n"),
            "cooldown_secs"
        );
        let settings =
            Settings::from_config(&make_config("[alerts]\ncooldown_secs = 31536000\n")).unwrap();
        assert_eq!(settings.alert_cooldown, Duration::seconds(MAX_COOLDOWN_SECS));
    }

    #[test]
    fn non_numeric_window_fails() {
        assert_eq!(invalid_key("[indicator]\ndefault_window = twenty\n"), "default_window");
        assert_eq!(invalid_key("[indicator]\ndefault_window = 0\n"), "default_window");
    }

    #[test]
    fn log_capacity_must_be_positive() {
        assert_eq!(invalid_key("[log]\nmax_entries = 0\n"), "max_entries");
    }

    #[test]
    fn base_currency_must_be_three_letters() {
        assert_eq!(invalid_key("[portfolio]\nbase_currency = DOLLARS\n"), "base_currency");
        assert!(validate_config(&make_config("[portfolio]\nbase_currency = gbp\n")).is_ok());
    }
}
