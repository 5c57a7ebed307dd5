//! Simple Moving Average.
//!
//! SMA(n)[i] = sum(C[i-j] for j in 0..n) / n, rounded to 4 decimals.
//! Warmup: first (n-1) values are undefined.
//!
//! A close that is missing, non-finite or non-positive is unusable, and every
//! window containing it yields `None`. The mean is kept as a running sum: the
//! incoming value is added and the expiring one subtracted, so the whole
//! series costs O(n). The sum carries a Neumaier compensation term, so a
//! huge close leaving the window does not wipe out the small ones after it.

use std::collections::VecDeque;

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::quote::Quote;
use crate::domain::rounding::round_to;

pub const DEFAULT_SMA_WINDOW: usize = 20;
const SMA_DECIMALS: u32 = 4;

/// Lazy SMA over a stream of closes.
#[derive(Debug, Clone)]
pub struct Sma<I> {
    closes: I,
    window: usize,
    history: VecDeque<Option<f64>>,
    sum: f64,
    comp: f64,
    unusable: usize,
}

impl<I> Sma<I>
where
    I: Iterator<Item = Option<f64>>,
{
    pub fn new(closes: I, window: usize) -> Self {
        Self {
            closes,
            window,
            history: VecDeque::new(),
            sum: 0.0,
            comp: 0.0,
            unusable: 0,
        }
    }

    fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.comp += (self.sum - t) + x;
        } else {
            self.comp += (x - t) + self.sum;
        }
        self.sum = t;
    }
}

impl<I> Iterator for Sma<I>
where
    I: Iterator<Item = Option<f64>>,
{
    type Item = Option<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        let incoming = self.closes.next()?.filter(|v| v.is_finite() && *v > 0.0);
        if self.window == 0 {
            return Some(None);
        }

        match incoming {
            Some(v) => self.add(v),
            None => self.unusable += 1,
        }
        self.history.push_back(incoming);

        if self.history.len() > self.window {
            if let Some(expired) = self.history.pop_front() {
                match expired {
                    Some(v) => self.add(-v),
                    None => self.unusable -= 1,
                }
            }
        }

        if self.history.len() < self.window || self.unusable > 0 {
            return Some(None);
        }
        Some(Some(round_to((self.sum + self.comp) / self.window as f64, SMA_DECIMALS)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.closes.size_hint()
    }
}

/// Adds `.sma(window)` to any iterator of optional closes.
pub trait SmaExt: Iterator<Item = Option<f64>> + Sized {
    fn sma(self, window: usize) -> Sma<Self> {
        Sma::new(self, window)
    }
}

impl<I: Iterator<Item = Option<f64>>> SmaExt for I {}

/// SMA of a plain close slice, one output per input.
pub fn sma_values(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    closes.iter().map(|&c| Some(c)).sma(window).collect()
}

pub fn calculate_sma(quotes: &[Quote], period: usize) -> IndicatorSeries {
    let values = quotes
        .iter()
        .map(Quote::usable_close)
        .sma(period)
        .zip(quotes)
        .map(|(value, q)| IndicatorPoint {
            date: q.date,
            value,
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
