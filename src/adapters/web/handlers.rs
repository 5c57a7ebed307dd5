//! HTTP request handlers for the JSON API.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::adapters::csv_adapter::{export_filename, log_entries_to_csv, quotes_to_csv};
use crate::domain::alert::AlertRule;
use crate::domain::comparison::{ComparisonResult, compare};
use crate::domain::error::MarketError;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::log_entry::{LogEntry, LogFilter, LogLevel};
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::symbol::{normalize_symbol, parse_symbols};

use super::dto::{
    CheckRequest, CheckResponse, CompareParams, CreateAlertRequest, CurrentQuoteResponse,
    HistoryResponse, LogParams, PositionRequest, RangeParams, SmaParams, SmaResponse,
    SymbolParams, parse_date,
};
use super::{AppState, WebError};

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, WebError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WebError::bad_request(format!("missing query parameter: {name}")))
}

fn date_param(value: &Option<String>, name: &str) -> Result<NaiveDate, WebError> {
    parse_date(name, required(value, name)?).map_err(WebError::bad_request)
}

fn symbol_param(value: &Option<String>) -> Result<String, WebError> {
    Ok(normalize_symbol(required(value, "symbol")?)?)
}

/// `start <= end` for plain history reads; a single day is a valid range.
fn history_range(params: &RangeParams) -> Result<(String, NaiveDate, NaiveDate), WebError> {
    let symbol = symbol_param(&params.symbol)?;
    let start = date_param(&params.start, "start")?;
    let end = date_param(&params.end, "end")?;
    if start > end {
        return Err(MarketError::InvalidRange { start, end }.into());
    }
    Ok((symbol, start, end))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<HistoryResponse>, WebError> {
    let (symbol, start, end) = history_range(&params)?;
    let quotes = state.quotes.fetch_quotes(&symbol, start, end)?;
    state
        .logs
        .info("history", format!("history for {symbol} {start}..{end}: {} quotes", quotes.len()));
    Ok(Json(HistoryResponse { symbol, quotes }))
}

pub async fn current(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SymbolParams>,
) -> Result<Json<CurrentQuoteResponse>, WebError> {
    let symbol = symbol_param(&params.symbol)?;
    match state.quotes.latest_quote(&symbol)? {
        Some(quote) => Ok(Json(CurrentQuoteResponse { symbol, quote })),
        None => {
            state.logs.warning("current", format!("no quotes stored for {symbol}"));
            Err(WebError::not_found(format!("no data for {symbol}")))
        }
    }
}

pub async fn sma(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SmaParams>,
) -> Result<Json<SmaResponse>, WebError> {
    let range = RangeParams {
        symbol: params.symbol,
        start: params.start,
        end: params.end,
    };
    let (symbol, start, end) = history_range(&range)?;
    let window = match params.window.as_deref().map(str::trim) {
        None | Some("") => state.default_window,
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            WebError::bad_request(format!("window must be a non-negative integer, got {raw:?}"))
        })?,
    };

    let quotes = state.quotes.fetch_quotes(&symbol, start, end)?;
    let series = calculate_sma(&quotes, window);
    Ok(Json(SmaResponse {
        symbol,
        window,
        values: series.values,
    }))
}

pub async fn compare_instruments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompareParams>,
) -> Result<Json<ComparisonResult>, WebError> {
    let symbols = parse_symbols(params.symbols.as_deref().unwrap_or_default());
    let start = date_param(&params.start, "start")?;
    let end = date_param(&params.end, "end")?;

    match compare(&*state.quotes, &symbols, start, end) {
        Ok(result) => {
            state
                .logs
                .info("compare", format!("compared {}", result.symbols.join(",")));
            Ok(Json(result))
        }
        Err(err) => {
            state.logs.warning("compare", err.to_string());
            Err(err.into())
        }
    }
}

pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Response, WebError> {
    let (symbol, start, end) = history_range(&params)?;
    let quotes = state.quotes.fetch_quotes(&symbol, start, end)?;
    let body = quotes_to_csv(&quotes)?;
    state
        .logs
        .info("export", format!("exported {} rows for {symbol}", quotes.len()));
    Ok(csv_attachment(&export_filename(&symbol, start, end), body))
}

fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

pub async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<AlertRule>> {
    Json(state.alerts.list())
}

pub async fn create_alert(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateAlertRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AlertRule>), WebError> {
    let Json(req) = payload?;
    let rule = state
        .alerts
        .create(&req.symbol, req.condition, req.threshold_price)
        .inspect_err(|err| {
            state.logs.warning("alerts", format!("alert rejected: {err}"));
        })?;
    state.logs.info(
        "alerts",
        format!(
            "alert {} created: {} {} {}",
            rule.id, rule.symbol, rule.condition, rule.threshold_price
        ),
    );
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn delete_alert(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<StatusCode, WebError> {
    let Path(id) = id?;
    let removed = state.alerts.delete(id)?;
    state
        .logs
        .info("alerts", format!("alert {id} deleted ({})", removed.symbol));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_alert(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<AlertRule>, WebError> {
    let Path(id) = id?;
    let rule = state.alerts.toggle(id)?;
    let status = if rule.active { "activated" } else { "deactivated" };
    state.logs.info("alerts", format!("alert {id} {status}"));
    Ok(Json(rule))
}

/// Evaluate all active alerts. Prices come from the request body when given,
/// otherwise from the latest stored close of each watched symbol.
pub async fn check_alerts(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CheckResponse>, WebError> {
    let request: CheckRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CheckRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| WebError::bad_request(format!("invalid check request: {e}")))?
    };

    let prices = match request.prices {
        Some(prices) => normalize_price_keys(prices),
        None => state.quotes.latest_closes(&state.alerts.watched_symbols())?,
    };

    let triggered = state.alerts.check_all(&prices);
    for alert in &triggered {
        state.logs.info(
            "alerts",
            format!(
                "alert {} triggered: {} {} {} at {}",
                alert.id, alert.symbol, alert.condition, alert.threshold_price, alert.current_price
            ),
        );
    }
    Ok(Json(CheckResponse { triggered }))
}

fn normalize_price_keys(prices: HashMap<String, f64>) -> HashMap<String, f64> {
    prices
        .into_iter()
        .filter_map(|(symbol, price)| normalize_symbol(&symbol).ok().map(|s| (s, price)))
        .collect()
}

fn snapshot(state: &AppState) -> Result<PortfolioSnapshot, WebError> {
    state
        .portfolio
        .valuate_with(|symbols| state.quotes.latest_closes(symbols))
        .map_err(|err| {
            state.logs.error("portfolio", err.to_string());
            err.into()
        })
}

pub async fn get_portfolio(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PortfolioSnapshot>, WebError> {
    Ok(Json(snapshot(&state)?))
}

pub async fn upsert_position(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PositionRequest>, JsonRejection>,
) -> Result<Json<PortfolioSnapshot>, WebError> {
    let Json(req) = payload?;
    let symbol = normalize_symbol(&req.symbol)?;
    if !state
        .quotes
        .latest_closes(std::slice::from_ref(&symbol))?
        .contains_key(&symbol)
    {
        let err = MarketError::MissingPrice { symbol };
        state.logs.warning("portfolio", format!("position rejected: {err}"));
        return Err(err.into());
    }
    let position = state
        .portfolio
        .upsert_position(&symbol, req.quantity, req.avg_open_price)?;
    state.logs.info(
        "portfolio",
        format!(
            "position {} set to {} @ {}",
            position.instrument, position.quantity, position.avg_open_price
        ),
    );
    Ok(Json(snapshot(&state)?))
}

pub async fn remove_position(
    State(state): State<Arc<AppState>>,
    symbol: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, WebError> {
    let Path(symbol) = symbol?;
    let removed = state.portfolio.remove_position(&symbol)?;
    state
        .logs
        .info("portfolio", format!("position {} removed", removed.instrument));
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts RFC 3339 timestamps or plain dates. A plain `date_to` covers the
/// whole day.
fn log_bound(raw: &str, name: &str, end_of_day: bool) -> Result<DateTime<Utc>, WebError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = parse_date(name, raw).map_err(WebError::bad_request)?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    let time = time.ok_or_else(|| WebError::internal("invalid time of day"))?;
    Ok(date.and_time(time).and_utc())
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `None` when the level names no known level: such a filter matches nothing.
fn log_filter(params: &LogParams) -> Result<Option<LogFilter>, WebError> {
    let level = match optional(&params.level) {
        None => None,
        Some(raw) => match raw.parse::<LogLevel>() {
            Ok(level) => Some(level),
            Err(_) => return Ok(None),
        },
    };
    Ok(Some(LogFilter {
        level,
        source: optional(&params.source).map(str::to_string),
        date_from: optional(&params.date_from)
            .map(|raw| log_bound(raw, "date_from", false))
            .transpose()?,
        date_to: optional(&params.date_to)
            .map(|raw| log_bound(raw, "date_to", true))
            .transpose()?,
    }))
}

fn query_logs(state: &AppState, params: &LogParams) -> Result<Vec<LogEntry>, WebError> {
    Ok(match log_filter(params)? {
        Some(filter) => state.logs.query(&filter),
        None => Vec::new(),
    })
}

pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogParams>,
) -> Result<Json<Vec<LogEntry>>, WebError> {
    Ok(Json(query_logs(&state, &params)?))
}

pub async fn export_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogParams>,
) -> Result<Response, WebError> {
    let entries = query_logs(&state, &params)?;
    let body = log_entries_to_csv(&entries)?;
    Ok(csv_attachment("logs.csv", body))
}

pub async fn clear_logs(State(state): State<Arc<AppState>>) -> StatusCode {
    let removed = state.logs.clear();
    tracing::info!(removed, "activity log cleared");
    StatusCode::NO_CONTENT
}

pub async fn not_found() -> WebError {
    WebError::not_found("not found")
}
