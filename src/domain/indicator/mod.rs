//! Technical indicator types.
//!
//! - `IndicatorPoint`: one value of an indicator series, `None` while undefined
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a series aligned index-for-index with its quotes

pub mod sma;

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Number of points holding a value.
    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|p| p.value.is_some()).count()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_sma() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
    }

    #[test]
    fn defined_count_skips_none() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Sma(2),
            values: vec![
                IndicatorPoint { date, value: None },
                IndicatorPoint {
                    date,
                    value: Some(1.5),
                },
            ],
        };
        assert_eq!(series.defined_count(), 1);
    }

    #[test]
    fn point_serializes_missing_as_null() {
        let point = IndicatorPoint {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            value: None,
        };
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, r#"{"date":"2024-03-01","value":null}"#);
    }
}
