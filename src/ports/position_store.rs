//! Portfolio position storage port trait.

use crate::domain::portfolio::Position;

/// Positions keyed by instrument. `upsert` replaces an existing entry in place.
pub trait PositionStore {
    fn upsert(&mut self, position: Position);

    fn remove(&mut self, instrument: &str) -> Option<Position>;

    /// All positions in first-insertion order.
    fn positions(&self) -> Vec<Position>;
}
