//! Price alert rules and their evaluation against current prices.
//!
//! A rule is either active or inactive. Active rules are evaluated on every
//! `check_all`; a rule stays active after firing and fires again on the next
//! check while its condition still holds, unless a cooldown is configured.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::MarketError;
use crate::domain::symbol::normalize_symbol;
use crate::ports::alert_store::AlertStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    #[serde(alias = ">")]
    Above,
    #[serde(alias = "<")]
    Below,
}

impl AlertCondition {
    /// Strict comparison: a price equal to the threshold never triggers.
    pub fn is_met(self, price: f64, threshold: f64) -> bool {
        match self {
            AlertCondition::Above => price > threshold,
            AlertCondition::Below => price < threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertCondition {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "above" | ">" => Ok(AlertCondition::Above),
            "below" | "<" => Ok(AlertCondition::Below),
            other => Err(MarketError::invalid_request(format!(
                "condition must be 'above' or 'below', got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: u64,
    pub symbol: String,
    pub condition: AlertCondition,
    pub threshold_price: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl AlertRule {
    fn in_cooldown(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_triggered_at {
            Some(at) => {
                cooldown > Duration::zero()
                    && at.checked_add_signed(cooldown).is_some_and(|until| now < until)
            }
            None => false,
        }
    }
}

/// A rule that fired during one `check_all` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredAlert {
    pub id: u64,
    pub symbol: String,
    pub condition: AlertCondition,
    pub threshold_price: f64,
    pub current_price: f64,
}

pub struct AlertEngine {
    store: Mutex<Box<dyn AlertStore + Send>>,
    cooldown: Duration,
}

impl AlertEngine {
    pub fn new(store: Box<dyn AlertStore + Send>) -> Self {
        Self {
            store: Mutex::new(store),
            cooldown: Duration::zero(),
        }
    }

    /// Suppress re-firing of a rule for `cooldown` after it last fired.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    // Store mutations are single statements, so a panic elsewhere while the
    // lock was held cannot leave a half-written rule behind.
    fn lock(&self) -> MutexGuard<'_, Box<dyn AlertStore + Send>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(
        &self,
        symbol: &str,
        condition: AlertCondition,
        threshold_price: f64,
    ) -> Result<AlertRule, MarketError> {
        let symbol = normalize_symbol(symbol)?;
        if !threshold_price.is_finite() || threshold_price <= 0.0 {
            return Err(MarketError::InvalidThreshold {
                value: threshold_price,
            });
        }

        let mut store = self.lock();
        let rule = AlertRule {
            id: store.next_id(),
            symbol,
            condition,
            threshold_price,
            active: true,
            created_at: Utc::now(),
            last_triggered_at: None,
        };
        store.insert(rule.clone());

        tracing::info!(
            id = rule.id,
            symbol = %rule.symbol,
            condition = %rule.condition,
            threshold = rule.threshold_price,
            "alert created"
        );
        Ok(rule)
    }

    pub fn delete(&self, id: u64) -> Result<AlertRule, MarketError> {
        let removed = self.lock().remove(id).ok_or(MarketError::NotFound { id })?;
        tracing::info!(id, symbol = %removed.symbol, "alert deleted");
        Ok(removed)
    }

    /// Flip a rule between active and inactive.
    pub fn toggle(&self, id: u64) -> Result<AlertRule, MarketError> {
        let mut store = self.lock();
        let rule = store.get_mut(id).ok_or(MarketError::NotFound { id })?;
        rule.active = !rule.active;
        tracing::info!(id, active = rule.active, "alert toggled");
        Ok(rule.clone())
    }

    pub fn list(&self) -> Vec<AlertRule> {
        self.lock().rules()
    }

    /// Symbols of active rules, without duplicates.
    pub fn watched_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        for rule in self.lock().rules() {
            if rule.active && !symbols.contains(&rule.symbol) {
                symbols.push(rule.symbol);
            }
        }
        symbols
    }

    pub fn check_all(&self, prices: &HashMap<String, f64>) -> Vec<TriggeredAlert> {
        self.check_all_at(prices, Utc::now())
    }

    /// Evaluate every active rule with a known price at instant `now`.
    ///
    /// Rules whose symbol is absent from `prices` are skipped. Fired rules get
    /// `last_triggered_at = now`; nothing else is mutated.
    pub fn check_all_at(
        &self,
        prices: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Vec<TriggeredAlert> {
        let cooldown = self.cooldown;
        let mut triggered = Vec::new();
        let mut store = self.lock();

        store.for_each_mut(&mut |rule| {
            if !rule.active || rule.in_cooldown(now, cooldown) {
                return;
            }
            let Some(&price) = prices.get(&rule.symbol) else {
                return;
            };
            if !rule.condition.is_met(price, rule.threshold_price) {
                return;
            }

            rule.last_triggered_at = Some(now);
            tracing::info!(
                id = rule.id,
                symbol = %rule.symbol,
                condition = %rule.condition,
                threshold = rule.threshold_price,
                price,
                "alert triggered"
            );
            triggered.push(TriggeredAlert {
                id: rule.id,
                symbol: rule.symbol.clone(),
                condition: rule.condition,
                threshold_price: rule.threshold_price,
                current_price: price,
            });
        });

        tracing::debug!(checked_prices = prices.len(), fired = triggered.len(), "alert check finished");
        triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryAlertStore;

    fn engine() -> AlertEngine {
        AlertEngine::new(Box::new(InMemoryAlertStore::new()))
    }

    fn prices(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    fn at(minute: u32) -> DateTime<Utc> {
        chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn condition_is_strict() {
        assert!(AlertCondition::Above.is_met(151.0, 150.0));
        assert!(!AlertCondition::Above.is_met(150.0, 150.0));
        assert!(AlertCondition::Below.is_met(149.0, 150.0));
        assert!(!AlertCondition::Below.is_met(150.0, 150.0));
    }

    #[test]
    fn condition_parses_wire_and_legacy_spellings() {
        assert_eq!("above".parse::<AlertCondition>().unwrap(), AlertCondition::Above);
        assert_eq!(" Below ".parse::<AlertCondition>().unwrap(), AlertCondition::Below);
        assert_eq!(">".parse::<AlertCondition>().unwrap(), AlertCondition::Above);
        assert_eq!("<".parse::<AlertCondition>().unwrap(), AlertCondition::Below);
        assert!(">=".parse::<AlertCondition>().is_err());
        assert!("WRONG".parse::<AlertCondition>().is_err());
    }

    #[test]
    fn condition_serde_uses_lowercase_with_aliases() {
        assert_eq!(serde_json::to_string(&AlertCondition::Above).unwrap(), "\"above\"");
        let legacy: AlertCondition = serde_json::from_str("\"<\"").unwrap();
        assert_eq!(legacy, AlertCondition::Below);
    }

    #[test]
    fn create_assigns_unique_ids_and_defaults() {
        let engine = engine();
        let a = engine.create(" aapl ", AlertCondition::Above, 150.0).unwrap();
        let b = engine.create("MSFT", AlertCondition::Below, 300.0).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.symbol, "AAPL");
        assert!(a.active);
        assert!(a.last_triggered_at.is_none());
    }

    #[test]
    fn create_rejects_bad_threshold() {
        let engine = engine();
        for bad in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let err = engine.create("AAPL", AlertCondition::Above, bad).unwrap_err();
            assert!(matches!(err, MarketError::InvalidThreshold { .. }), "{bad}");
        }
        assert!(engine.list().is_empty());
    }

    #[test]
    fn create_rejects_blank_symbol() {
        let err = engine().create("  ", AlertCondition::Above, 1.0).unwrap_err();
        assert!(matches!(err, MarketError::InvalidSymbol { .. }));
    }

    #[test]
    fn list_preserves_insertion_order() {
        let engine = engine();
        engine.create("TSLA", AlertCondition::Above, 1.0).unwrap();
        engine.create("AAPL", AlertCondition::Above, 1.0).unwrap();
        let symbols: Vec<_> = engine.list().into_iter().map(|r| r.symbol).collect();
        assert_eq!(symbols, vec!["TSLA", "AAPL"]);
    }

    #[test]
    fn fires_then_keeps_last_triggered_at() {
        let engine = engine();
        let rule = engine.create("AAPL", AlertCondition::Above, 150.0).unwrap();

        let fired = engine.check_all_at(&prices(&[("AAPL", 151.0)]), at(0));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, rule.id);
        assert_eq!(fired[0].current_price, 151.0);
        assert_eq!(fired[0].threshold_price, 150.0);
        assert_eq!(engine.list()[0].last_triggered_at, Some(at(0)));

        let fired = engine.check_all_at(&prices(&[("AAPL", 149.0)]), at(1));
        assert!(fired.is_empty());
        assert_eq!(engine.list()[0].last_triggered_at, Some(at(0)));
    }

    #[test]
    fn fires_repeatedly_while_condition_holds() {
        let engine = engine();
        engine.create("AAPL", AlertCondition::Below, 100.0).unwrap();
        let p = prices(&[("AAPL", 90.0)]);

        assert_eq!(engine.check_all_at(&p, at(0)).len(), 1);
        assert_eq!(engine.check_all_at(&p, at(1)).len(), 1);
        assert_eq!(engine.list()[0].last_triggered_at, Some(at(1)));
        assert!(engine.list()[0].active);
    }

    #[test]
    fn cooldown_suppresses_refire() {
        let engine = engine().with_cooldown(Duration::minutes(5));
        engine.create("AAPL", AlertCondition::Below, 100.0).unwrap();
        let p = prices(&[("AAPL", 90.0)]);

        assert_eq!(engine.check_all_at(&p, at(0)).len(), 1);
        assert!(engine.check_all_at(&p, at(4)).is_empty());
        assert_eq!(engine.check_all_at(&p, at(5)).len(), 1);
    }

    #[test]
    fn missing_price_is_skipped() {
        let engine = engine();
        engine.create("AAPL", AlertCondition::Above, 1.0).unwrap();
        engine.create("MSFT", AlertCondition::Above, 1.0).unwrap();

        let fired = engine.check_all_at(&prices(&[("MSFT", 2.0)]), at(0));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].symbol, "MSFT");
        assert!(engine.list()[0].last_triggered_at.is_none());
    }

    #[test]
    fn inactive_rules_are_not_evaluated() {
        let engine = engine();
        let rule = engine.create("AAPL", AlertCondition::Above, 1.0).unwrap();
        let toggled = engine.toggle(rule.id).unwrap();
        assert!(!toggled.active);

        assert!(engine.check_all_at(&prices(&[("AAPL", 5.0)]), at(0)).is_empty());
        assert!(engine.watched_symbols().is_empty());

        assert!(engine.toggle(rule.id).unwrap().active);
        assert_eq!(engine.watched_symbols(), vec!["AAPL"]);
    }

    #[test]
    fn toggle_unknown_is_not_found() {
        assert!(matches!(
            engine().toggle(42),
            Err(MarketError::NotFound { id: 42 })
        ));
    }

    #[test]
    fn delete_twice_reports_not_found() {
        let engine = engine();
        let rule = engine.create("AAPL", AlertCondition::Above, 150.0).unwrap();

        assert_eq!(engine.delete(rule.id).unwrap().id, rule.id);
        match engine.delete(rule.id) {
            Err(MarketError::NotFound { id }) => assert_eq!(id, rule.id),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(engine.list().iter().all(|r| r.id != rule.id));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let engine = engine();
        let a = engine.create("AAPL", AlertCondition::Above, 1.0).unwrap();
        engine.delete(a.id).unwrap();
        let b = engine.create("AAPL", AlertCondition::Above, 1.0).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn concurrent_checks_fire_each_rule_once_per_call() {
        use std::sync::Arc;
        use std::thread;

        let engine = Arc::new(engine());
        for i in 0..20 {
            engine
                .create(&format!("S{i}"), AlertCondition::Above, 10.0)
                .unwrap();
        }
        let p: HashMap<String, f64> = (0..20).map(|i| (format!("S{i}"), 11.0)).collect();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let p = p.clone();
                thread::spawn(move || engine.check_all(&p).len())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 20);
        }
    }
}
