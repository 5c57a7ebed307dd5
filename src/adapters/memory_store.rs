//! In-process stores for alert rules and portfolio positions.
//!
//! Contents live only as long as the process. Both keep insertion order.

use crate::domain::alert::AlertRule;
use crate::domain::portfolio::Position;
use crate::ports::alert_store::AlertStore;
use crate::ports::position_store::PositionStore;

#[derive(Debug)]
pub struct InMemoryAlertStore {
    rules: Vec<AlertRule>,
    next_id: u64,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            next_id: 1,
        }
    }
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore for InMemoryAlertStore {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, rule: AlertRule) {
        self.rules.push(rule);
    }

    fn remove(&mut self, id: u64) -> Option<AlertRule> {
        let index = self.rules.iter().position(|r| r.id == id)?;
        Some(self.rules.remove(index))
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut AlertRule> {
        self.rules.iter_mut().find(|r| r.id == id)
    }

    fn rules(&self) -> Vec<AlertRule> {
        self.rules.clone()
    }

    fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut AlertRule)) {
        self.rules.iter_mut().for_each(f);
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPositionStore {
    positions: Vec<Position>,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for InMemoryPositionStore {
    fn upsert(&mut self, position: Position) {
        match self
            .positions
            .iter_mut()
            .find(|p| p.instrument == position.instrument)
        {
            Some(existing) => *existing = position,
            None => self.positions.push(position),
        }
    }

    fn remove(&mut self, instrument: &str) -> Option<Position> {
        let index = self
            .positions
            .iter()
            .position(|p| p.instrument == instrument)?;
        Some(self.positions.remove(index))
    }

    fn positions(&self) -> Vec<Position> {
        self.positions.clone()
    }
}
