//! Core domain types and logic.

pub mod alert;
pub mod comparison;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod log_entry;
pub mod portfolio;
pub mod quote;
pub mod rounding;
pub mod symbol;
