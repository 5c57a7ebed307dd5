//! Alert rule storage port trait.

use crate::domain::alert::AlertRule;

/// Exclusive owner of alert rules. Implementations need no internal locking:
/// `AlertEngine` serializes every access behind one mutex.
pub trait AlertStore {
    /// Allocate an id never handed out before by this store.
    fn next_id(&mut self) -> u64;

    fn insert(&mut self, rule: AlertRule);

    fn remove(&mut self, id: u64) -> Option<AlertRule>;

    fn get_mut(&mut self, id: u64) -> Option<&mut AlertRule>;

    /// All rules in insertion order.
    fn rules(&self) -> Vec<AlertRule>;

    fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut AlertRule));
}
