//! Cross-instrument comparison: normalization to a common basis and
//! per-symbol return, volatility and drawdown metrics.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::MarketError;
use crate::domain::quote::Quote;
use crate::domain::rounding::round_to;
use crate::ports::quote_port::QuotePort;

/// Value every normalized series starts at.
pub const NORMALIZATION_BASIS: f64 = 100.0;
const PERCENT_DECIMALS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub normalized: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMetrics {
    pub symbol: String,
    pub return_pct: f64,
    pub volatility_pct: f64,
    pub max_drawdown_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub symbols: Vec<String>,
    pub series: BTreeMap<String, Vec<ComparisonPoint>>,
    pub metrics: Vec<InstrumentMetrics>,
}

/// Compare `symbols` over `[start, end]` using quotes from `port`.
///
/// Symbols keep the requested order in both `symbols` and `metrics`.
pub fn compare(
    port: &dyn QuotePort,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ComparisonResult, MarketError> {
    if symbols.is_empty() {
        return Err(MarketError::invalid_request("at least one symbol is required"));
    }
    if start >= end {
        return Err(MarketError::InvalidRange { start, end });
    }

    tracing::debug!(?symbols, %start, %end, "comparing instruments");

    let mut series = BTreeMap::new();
    let mut metrics = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let quotes: Vec<Quote> = port
            .fetch_quotes(symbol, start, end)?
            .into_iter()
            .filter(|q| q.date >= start && q.date <= end)
            .collect();

        let (points, symbol_metrics) = compare_quotes(symbol, &quotes)?;
        series.insert(symbol.clone(), points);
        metrics.push(symbol_metrics);
    }

    Ok(ComparisonResult {
        symbols: symbols.to_vec(),
        series,
        metrics,
    })
}

/// Normalized series and metrics for one symbol's in-range quotes.
pub fn compare_quotes(
    symbol: &str,
    quotes: &[Quote],
) -> Result<(Vec<ComparisonPoint>, InstrumentMetrics), MarketError> {
    let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
    let normalized = normalize(&closes).ok_or_else(|| MarketError::NoDataForSymbol {
        symbol: symbol.to_string(),
    })?;

    let points = quotes
        .iter()
        .zip(normalized)
        .map(|(q, n)| ComparisonPoint {
            date: q.date,
            close: q.close,
            normalized: round_to(n, PERCENT_DECIMALS),
        })
        .collect();

    let metrics = InstrumentMetrics {
        symbol: symbol.to_string(),
        return_pct: round_to(return_pct(&closes), PERCENT_DECIMALS),
        volatility_pct: round_to(volatility_pct(&closes), PERCENT_DECIMALS),
        max_drawdown_pct: round_to(max_drawdown_pct(&closes), PERCENT_DECIMALS),
    };

    Ok((points, metrics))
}

/// Rescale so the first close equals 100. `None` when the series is empty or
/// the first close cannot serve as a basis.
pub fn normalize(closes: &[f64]) -> Option<Vec<f64>> {
    let base = *closes.first()?;
    if !base.is_finite() || base <= 0.0 {
        return None;
    }
    Some(
        closes
            .iter()
            .map(|c| NORMALIZATION_BASIS * c / base)
            .collect(),
    )
}

/// 100 × (last − first) / first; 0 with fewer than two closes.
pub fn return_pct(closes: &[f64]) -> f64 {
    match (closes.first(), closes.last()) {
        (Some(&first), Some(&last)) if closes.len() >= 2 && first > 0.0 => {
            100.0 * (last - first) / first
        }
        _ => 0.0,
    }
}

/// Day-over-day simple returns, skipping steps whose previous close is not positive.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// 100 × standard deviation of the daily returns (population form).
pub fn volatility_pct(closes: &[f64]) -> f64 {
    let returns = daily_returns(closes);
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    100.0 * variance.sqrt()
}

/// 100 × the largest decline from a running peak, as a positive number.
pub fn max_drawdown_pct(closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }

    let mut peak = closes[0];
    let mut max_dd = 0.0_f64;

    for &close in closes {
        if close > peak {
            peak = close;
        } else if peak > 0.0 {
            let dd = (peak - close) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    100.0 * max_dd
}
