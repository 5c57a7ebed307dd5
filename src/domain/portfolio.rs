//! Portfolio positions and their valuation against current prices.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::domain::error::MarketError;
use crate::domain::symbol::normalize_symbol;
use crate::ports::position_store::PositionStore;

pub const DEFAULT_PORTFOLIO_NAME: &str = "Default portfolio";
pub const DEFAULT_BASE_CURRENCY: &str = "USD";

/// A holding. Quantity may be fractional or negative (short).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub quantity: f64,
    pub avg_open_price: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.avg_open_price)
    }

    pub fn valuate(&self, current_price: f64) -> PositionValuation {
        PositionValuation {
            instrument: self.instrument.clone(),
            quantity: self.quantity,
            avg_open_price: self.avg_open_price,
            current_price,
            position_value: self.market_value(current_price),
            unrealized_pnl: self.unrealized_pnl(current_price),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValuation {
    pub instrument: String,
    pub quantity: f64,
    pub avg_open_price: f64,
    pub current_price: f64,
    pub position_value: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub name: String,
    pub base_currency: String,
    pub total_value: f64,
    pub positions: Vec<PositionValuation>,
}

pub struct PortfolioEngine {
    name: String,
    base_currency: String,
    store: Mutex<Box<dyn PositionStore + Send>>,
}

impl PortfolioEngine {
    pub fn new(store: Box<dyn PositionStore + Send>) -> Self {
        Self {
            name: DEFAULT_PORTFOLIO_NAME.to_string(),
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            store: Mutex::new(store),
        }
    }

    pub fn with_identity(mut self, name: impl Into<String>, base_currency: impl Into<String>) -> Self {
        self.name = name.into();
        self.base_currency = base_currency.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn PositionStore + Send>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the position for `instrument` (case-insensitive).
    pub fn upsert_position(
        &self,
        instrument: &str,
        quantity: f64,
        avg_open_price: f64,
    ) -> Result<Position, MarketError> {
        let instrument = normalize_symbol(instrument)?;
        if !quantity.is_finite() || !avg_open_price.is_finite() {
            return Err(MarketError::InvalidQuantityOrPrice {
                instrument,
                quantity,
                avg_open_price,
            });
        }

        let position = Position {
            instrument,
            quantity,
            avg_open_price,
        };
        self.lock().upsert(position.clone());
        tracing::info!(
            instrument = %position.instrument,
            quantity,
            avg_open_price,
            "position upserted"
        );
        Ok(position)
    }

    pub fn remove_position(&self, instrument: &str) -> Result<Position, MarketError> {
        let instrument = normalize_symbol(instrument)?;
        let removed = self
            .lock()
            .remove(&instrument)
            .ok_or(MarketError::MissingPosition { symbol: instrument })?;
        tracing::info!(instrument = %removed.instrument, "position removed");
        Ok(removed)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.lock().positions()
    }

    /// Value one snapshot of the positions. `prices_for` receives exactly the
    /// instruments of that snapshot and runs without the store lock held, so
    /// writes made meanwhile do not affect this valuation.
    ///
    /// A position without a price fails the whole valuation with
    /// `MissingPrice`.
    pub fn valuate_with<F>(&self, prices_for: F) -> Result<PortfolioSnapshot, MarketError>
    where
        F: FnOnce(&[String]) -> Result<HashMap<String, f64>, MarketError>,
    {
        let positions = self.positions();
        let instruments: Vec<String> = positions.iter().map(|p| p.instrument.clone()).collect();
        let prices = prices_for(&instruments)?;

        let valuations = positions
            .iter()
            .map(|position| {
                prices
                    .get(&position.instrument)
                    .map(|&price| position.valuate(price))
                    .ok_or_else(|| MarketError::MissingPrice {
                        symbol: position.instrument.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total_value = valuations.iter().map(|v| v.position_value).sum();
        tracing::debug!(positions = valuations.len(), total_value, "portfolio valuated");

        Ok(PortfolioSnapshot {
            name: self.name.clone(),
            base_currency: self.base_currency.clone(),
            total_value,
            positions: valuations,
        })
    }
}
