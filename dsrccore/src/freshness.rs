//! Last communication bookkeeping and the report throttle built on it.

use std::collections::HashMap;

use crate::{entity::EntityId, units::Time};

/// Most recent logged communication time per entity.
/// Timestamps only ever move forward.
#[derive(Debug, Clone, Default)]
pub struct ContactLedger {
    last: HashMap<EntityId, Time>,
}

impl ContactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_contact(&self, id: &EntityId) -> Option<Time> {
        self.last.get(id).copied()
    }

    /// Moves the timestamp of `id` to `now` unless it is already later.
    pub fn advance(&mut self, id: &EntityId, now: Time) {
        match self.last.get_mut(id) {
            Some(time) => *time = time.max(now),
            None => {
                self.last.insert(id.clone(), now);
            }
        }
    }

    /// Records `now` if `id` has never been seen and returns `None`.
    /// Otherwise leaves the ledger untouched and returns the stored time.
    pub fn first_contact(&mut self, id: &EntityId, now: Time) -> Option<Time> {
        match self.last.get(id) {
            Some(&time) => Some(time),
            None => {
                self.last.insert(id.clone(), now);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

/// Suppresses repeated log entries for the same entity.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessGate {
    pub window: Time,
}

impl FreshnessGate {
    pub fn new(window: Time) -> Self {
        FreshnessGate { window }
    }

    /// Returns the delay to report if `id` may be logged at `now`, advancing its
    /// timestamp. The delay is zero the first time an entity is seen.
    pub fn admit(&self, ledger: &mut ContactLedger, id: &EntityId, now: Time) -> Option<Time> {
        let delay = match ledger.last_contact(id) {
            None => Time::ZERO,
            Some(previous) if now - previous > self.window => now - previous,
            Some(_) => return None,
        };

        ledger.advance(id, now);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::SECONDS;

    #[test]
    fn gate_throttles_within_window() {
        let gate = FreshnessGate::new(1.0 * SECONDS);
        let mut ledger = ContactLedger::new();
        let id = EntityId::from("veh0");

        assert_eq!(gate.admit(&mut ledger, &id, 3.0 * SECONDS), Some(Time::ZERO));
        assert_eq!(gate.admit(&mut ledger, &id, 3.5 * SECONDS), None);
        // Exactly one second later is not "more than" one second.
        assert_eq!(gate.admit(&mut ledger, &id, 4.0 * SECONDS), None);
        assert_eq!(
            gate.admit(&mut ledger, &id, 5.0 * SECONDS),
            Some(2.0 * SECONDS)
        );
        assert_eq!(ledger.last_contact(&id), Some(5.0 * SECONDS));
    }

    #[test]
    fn gate_tracks_entities_separately() {
        let gate = FreshnessGate::new(1.0 * SECONDS);
        let mut ledger = ContactLedger::new();
        let a = EntityId::from("a");
        let b = EntityId::from("b");

        assert!(gate.admit(&mut ledger, &a, 1.0 * SECONDS).is_some());
        assert!(gate.admit(&mut ledger, &b, 1.0 * SECONDS).is_some());
        assert!(gate.admit(&mut ledger, &a, 1.5 * SECONDS).is_none());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn ledger_never_moves_back() {
        let mut ledger = ContactLedger::new();
        let id = EntityId::from("veh0");

        ledger.advance(&id, 10.0 * SECONDS);
        ledger.advance(&id, 4.0 * SECONDS);
        assert_eq!(ledger.last_contact(&id), Some(10.0 * SECONDS));
    }

    #[test]
    fn first_contact_only_records_once() {
        let mut ledger = ContactLedger::new();
        let id = EntityId::from("veh0");

        assert_eq!(ledger.first_contact(&id, 2.0 * SECONDS), None);
        assert_eq!(ledger.first_contact(&id, 6.0 * SECONDS), Some(2.0 * SECONDS));
        assert_eq!(ledger.last_contact(&id), Some(2.0 * SECONDS));
    }
}
