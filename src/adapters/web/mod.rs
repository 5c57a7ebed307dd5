//! JSON/HTTP adapter over the analytics and alerting engines.
//!
//! The route table and field names form the wire contract with the
//! dashboard UI. Handlers call the synchronous engines directly; every
//! engine operation takes one short lock.

mod dto;
mod error;
mod handlers;

pub use dto::*;
pub use error::{WebError, status_from_error};
pub use handlers::*;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::memory_store::{InMemoryAlertStore, InMemoryPositionStore};
use crate::domain::alert::AlertEngine;
use crate::domain::config_validation::Settings;
use crate::domain::error::MarketError;
use crate::domain::log_entry::LogBook;
use crate::domain::portfolio::PortfolioEngine;
use crate::ports::quote_port::QuotePort;

pub struct AppState {
    pub quotes: Arc<dyn QuotePort + Send + Sync>,
    pub alerts: AlertEngine,
    pub portfolio: PortfolioEngine,
    pub logs: LogBook,
    pub default_window: usize,
}

impl AppState {
    /// State with empty in-memory alert and position stores.
    pub fn new(quotes: Arc<dyn QuotePort + Send + Sync>, settings: &Settings) -> Self {
        Self {
            quotes,
            alerts: AlertEngine::new(Box::new(InMemoryAlertStore::new()))
                .with_cooldown(settings.alert_cooldown),
            portfolio: PortfolioEngine::new(Box::new(InMemoryPositionStore::new()))
                .with_identity(&settings.portfolio_name, &settings.base_currency),
            logs: LogBook::new(settings.log_capacity),
            default_window: settings.default_window,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/history", get(handlers::history))
        .route("/api/current", get(handlers::current))
        .route("/api/indicators/sma", get(handlers::sma))
        .route("/api/compare", get(handlers::compare_instruments))
        .route("/api/export/csv", get(handlers::export_csv))
        .route(
            "/api/alerts",
            get(handlers::list_alerts).post(handlers::create_alert),
        )
        .route("/api/alerts/check", post(handlers::check_alerts))
        .route("/api/alerts/{id}", delete(handlers::delete_alert))
        .route("/api/alerts/{id}/toggle", post(handlers::toggle_alert))
        .route("/api/portfolio", get(handlers::get_portfolio))
        .route("/api/portfolio/positions", post(handlers::upsert_position))
        .route(
            "/api/portfolio/positions/{symbol}",
            delete(handlers::remove_position),
        )
        .route(
            "/api/logs",
            get(handlers::list_logs).delete(handlers::clear_logs),
        )
        .route("/api/logs/export", get(handlers::export_logs))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), MarketError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "market-analyzer listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
