//! Ticker symbol normalization and comma-separated symbol lists.

use std::collections::HashSet;

use crate::domain::error::MarketError;

/// Trim and uppercase a symbol.
///
/// Symbols are ASCII letters and digits plus `.`, `-`, `_`, `^` and `=`
/// (`BRK.B`, `^GSPC`, `EURUSD=X`). Empty symbols and symbols containing `..`
/// are rejected.
pub fn normalize_symbol(raw: &str) -> Result<String, MarketError> {
    let symbol = raw.trim().to_ascii_uppercase();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '^' | '=');
    if symbol.is_empty() || !symbol.chars().all(allowed) || symbol.contains("..") {
        return Err(MarketError::InvalidSymbol {
            symbol: raw.to_string(),
        });
    }
    Ok(symbol)
}

/// Parse `"aapl, MSFT,,tsla"` into `["AAPL", "MSFT", "TSLA"]`.
///
/// Empty tokens are dropped and repeated symbols keep their first position,
/// so the request order is preserved.
pub fn parse_symbols(input: &str) -> Vec<String> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let Ok(symbol) = normalize_symbol(token) else {
            continue;
        };
        if seen.insert(symbol.clone()) {
            symbols.push(symbol);
        }
    }

    symbols
}
