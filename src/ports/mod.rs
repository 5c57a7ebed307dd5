//! Port traits between the domain and its adapters.

pub mod alert_store;
pub mod config_port;
pub mod position_store;
pub mod quote_port;
