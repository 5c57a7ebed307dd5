//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::{CsvAdapter, quotes_to_csv};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::comparison::compare;
use crate::domain::config_validation::Settings;
use crate::domain::error::MarketError;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::symbol::{normalize_symbol, parse_symbols};
use crate::ports::quote_port::QuotePort;

#[derive(Parser, Debug)]
#[command(name = "market-analyzer", about = "Market data analytics and price alerts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the JSON API server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print stored quotes as CSV
    History {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Print the simple moving average of closes
    Sma {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        window: Option<usize>,
    },
    /// Compare instruments over a date range (JSON output)
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols, e.g. AAPL,MSFT
        #[arg(long)]
        symbols: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Load <SYMBOL>.csv files into the sqlite quote store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// List symbols with stored quotes
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored date range for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::History {
            config,
            symbol,
            start,
            end,
        } => run_history(&config, &symbol, start, end),
        Command::Sma {
            config,
            symbol,
            start,
            end,
            window,
        } => run_sma(&config, &symbol, start, end, window),
        Command::Compare {
            config,
            symbols,
            start,
            end,
        } => run_compare(&config, &symbols, start, end),
        Command::Import { config, csv_dir } => run_import(&config, csv_dir.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, symbol } => run_info(&config, &symbol),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_settings(path: &Path) -> Result<Settings, MarketError> {
    let config = FileConfigAdapter::from_file(path)?;
    let settings = Settings::from_config(&config)?;
    init_tracing(&settings.log_filter);
    tracing::debug!(config = %path.display(), "configuration loaded");
    Ok(settings)
}

#[cfg(feature = "sqlite")]
fn open_sqlite(settings: &Settings) -> Result<crate::adapters::sqlite_adapter::SqliteAdapter, MarketError> {
    let adapter =
        crate::adapters::sqlite_adapter::SqliteAdapter::open(&settings.sqlite_path, settings.pool_size)?;
    adapter.initialize_schema()?;
    Ok(adapter)
}

/// The sqlite store when built with it, else the configured CSV directory.
pub fn open_quote_port(settings: &Settings) -> Result<Arc<dyn QuotePort + Send + Sync>, MarketError> {
    #[cfg(feature = "sqlite")]
    {
        Ok(Arc::new(open_sqlite(settings)?))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        match &settings.csv_dir {
            Some(dir) => Ok(Arc::new(CsvAdapter::new(dir))),
            None => Err(MarketError::ConfigMissing {
                section: "csv".to_string(),
                key: "dir".to_string(),
            }),
        }
    }
}

fn run_serve(config_path: &Path) -> Result<(), MarketError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, serve};

        let settings = load_settings(config_path)?;
        let quotes = open_quote_port(&settings)?;
        let state = AppState::new(quotes, &settings);

        tokio::runtime::Runtime::new()?.block_on(serve(state, settings.listen))
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        Err(MarketError::invalid_request(
            "serve requires the `web` feature",
        ))
    }
}

fn run_history(
    config_path: &Path,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), MarketError> {
    let settings = load_settings(config_path)?;
    let port = open_quote_port(&settings)?;
    let symbol = normalize_symbol(symbol)?;
    if start > end {
        return Err(MarketError::InvalidRange { start, end });
    }

    let quotes = port.fetch_quotes(&symbol, start, end)?;
    print!("{}", quotes_to_csv(&quotes)?);
    eprintln!("{} quotes for {symbol}", quotes.len());
    Ok(())
}

fn run_sma(
    config_path: &Path,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    window: Option<usize>,
) -> Result<(), MarketError> {
    let settings = load_settings(config_path)?;
    let port = open_quote_port(&settings)?;
    let symbol = normalize_symbol(symbol)?;
    if start > end {
        return Err(MarketError::InvalidRange { start, end });
    }

    let window = window.unwrap_or(settings.default_window);
    let quotes = port.fetch_quotes(&symbol, start, end)?;
    let series = calculate_sma(&quotes, window);

    println!("date,{}", series.indicator_type);
    for point in &series.values {
        match point.value {
            Some(v) => println!("{},{v:.4}", point.date),
            None => println!("{},", point.date),
        }
    }
    eprintln!(
        "{} of {} points defined",
        series.defined_count(),
        series.values.len()
    );
    Ok(())
}

fn run_compare(
    config_path: &Path,
    symbols: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), MarketError> {
    let settings = load_settings(config_path)?;
    let port = open_quote_port(&settings)?;
    let symbols = parse_symbols(symbols);

    let result = compare(&*port, &symbols, start, end)?;
    let json = serde_json::to_string_pretty(&result)
        .map_err(|e| MarketError::Io(std::io::Error::other(e)))?;
    println!("{json}");
    Ok(())
}

fn run_import(config_path: &Path, csv_dir: Option<&Path>) -> Result<(), MarketError> {
    let settings = load_settings(config_path)?;
    let dir = match (csv_dir, &settings.csv_dir) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(dir)) => PathBuf::from(dir),
        (None, None) => {
            return Err(MarketError::ConfigMissing {
                section: "csv".to_string(),
                key: "dir".to_string(),
            });
        }
    };

    #[cfg(feature = "sqlite")]
    {
        let source = CsvAdapter::new(&dir);
        let store = open_sqlite(&settings)?;
        let mut total = 0;
        for symbol in source.list_symbols()? {
            let quotes = source.load_all(&symbol)?;
            let rows = store.insert_quotes(&quotes)?;
            tracing::info!(%symbol, rows, "imported");
            eprintln!("{symbol}: {rows} quotes");
            total += rows;
        }
        eprintln!("imported {total} quotes from {}", dir.display());
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        Err(MarketError::invalid_request(format!(
            "import from {} requires the `sqlite` feature",
            dir.display()
        )))
    }
}

fn run_list_symbols(config_path: &Path) -> Result<(), MarketError> {
    let settings = load_settings(config_path)?;
    let symbols = open_quote_port(&settings)?.list_symbols()?;

    if symbols.is_empty() {
        eprintln!("No symbols stored");
    } else {
        for symbol in &symbols {
            println!("{symbol}");
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_info(config_path: &Path, symbol: &str) -> Result<(), MarketError> {
    let settings = load_settings(config_path)?;
    let symbol = normalize_symbol(symbol)?;

    match open_quote_port(&settings)?.get_data_range(&symbol)? {
        Some((first, last, count)) => {
            println!("{symbol}: {count} quotes, {first} to {last}");
            Ok(())
        }
        None => Err(MarketError::NoDataForSymbol { symbol }),
    }
}

fn run_validate(config_path: &Path) -> Result<(), MarketError> {
    eprintln!("Validating config: {}", config_path.display());
    let settings = load_settings(config_path)?;

    println!("sqlite:     {} (pool {})", settings.sqlite_path, settings.pool_size);
    if let Some(dir) = &settings.csv_dir {
        println!("csv dir:    {dir}");
    }
    println!("listen:     {}", settings.listen);
    println!(
        "portfolio:  {} ({})",
        settings.portfolio_name, settings.base_currency
    );
    println!("cooldown:   {}s", settings.alert_cooldown.num_seconds());
    println!("sma window: {}", settings.default_window);
    eprintln!("Config is valid");
    Ok(())
}
