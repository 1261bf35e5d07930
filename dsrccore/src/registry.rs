//! In-flight message tracking for the meshed mode.

use std::collections::{HashMap, hash_map::Entry};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    delivery::DeliveryModel,
    entity::EntityId,
    link::Link,
    units::{Length, Time},
};

/// Deterministic identity of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageId {
    pub source: EntityId,
    pub target: EntityId,
    /// Simulation time of the tick the message was created in.
    pub created: Time,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Seconds left before the message expires.
    pub lifetime: Time,
    /// Decays applied since creation.
    #[serde(default)]
    pub age: u64,
    /// Link distance when the message was created.
    pub range: Length,
    pub delay: Time,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    Created(Message),
}

/// Relative residue below which a remaining lifetime counts as spent.
const EXPIRY_TOLERANCE: f64 = 1e-9;

/// Owns every live message. At most one live message exists per directed pair.
#[derive(Debug, Clone)]
pub struct MessageRegistry {
    live: HashMap<(EntityId, EntityId), Message>,
    lifetime: Time,
    decrement: Time,
}

impl MessageRegistry {
    pub fn new(lifetime: Time, decrement: Time) -> Self {
        MessageRegistry {
            live: HashMap::new(),
            lifetime,
            decrement,
        }
    }

    /// Creates a message for the link's directed pair unless one is already live.
    pub fn on_link<R: Rng>(
        &mut self,
        link: &Link,
        now: Time,
        delivery: &mut DeliveryModel<R>,
    ) -> Option<MessageEvent> {
        match self.live.entry((link.source.clone(), link.target.clone())) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let message = Message {
                    id: MessageId {
                        source: link.source.clone(),
                        target: link.target.clone(),
                        created: now,
                    },
                    lifetime: self.lifetime,
                    age: 0,
                    range: link.distance,
                    delay: delivery.sample_delay(),
                };

                slot.insert(message.clone());
                Some(MessageEvent::Created(message))
            }
        }
    }

    /// Ages every live message by one tick and drops the ones that ran out.
    /// Returns how many expired.
    ///
    /// The remaining lifetime is recomputed from the age so a decrement that
    /// is not exact in binary cannot accumulate into an extra tick.
    pub fn decay(&mut self) -> usize {
        let before = self.live.len();
        let (lifetime, decrement) = (self.lifetime, self.decrement);
        let spent = decrement * EXPIRY_TOLERANCE;

        self.live.retain(|_, message| {
            message.age += 1;
            message.lifetime = lifetime - decrement * message.age as f64;
            message.lifetime > spent
        });

        before - self.live.len()
    }

    pub fn get(&self, source: &EntityId, target: &EntityId) -> Option<&Message> {
        self.live.get(&(source.clone(), target.clone()))
    }

    pub fn is_live(&self, source: &EntityId, target: &EntityId) -> bool {
        self.get(source, target).is_some()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimConfig,
        link::LinkClass,
        units::{METRES, SECONDS},
    };

    fn link(source: &str, target: &str) -> Link {
        Link {
            source: source.into(),
            target: target.into(),
            distance: 10.0 * METRES,
            class: LinkClass::Vtv,
        }
    }

    fn setup() -> (MessageRegistry, DeliveryModel) {
        let config = SimConfig::meshed();
        (
            MessageRegistry::new(config.message_lifetime, config.lifetime_decrement()),
            DeliveryModel::from_seed(&config, 5).unwrap(),
        )
    }

    #[test]
    fn creates_once_per_pair() {
        let (mut registry, mut delivery) = setup();
        let ab = link("a", "b");

        let first = registry.on_link(&ab, 1.0 * SECONDS, &mut delivery);
        let Some(MessageEvent::Created(message)) = first else {
            panic!("first contact should create a message");
        };
        assert_eq!(message.id.created, 1.0 * SECONDS);
        assert_eq!(message.lifetime, 5.0 * SECONDS);
        assert_eq!(message.range, 10.0 * METRES);

        for tick in 0..3 {
            assert_eq!(registry.on_link(&ab, 1.0 * SECONDS, &mut delivery), None);
            assert_eq!(
                registry.on_link(&ab, (2.0 + tick as f64) * SECONDS, &mut delivery),
                None
            );
            registry.decay();
        }

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn pairs_are_directed() {
        let (mut registry, mut delivery) = setup();

        assert!(registry.on_link(&link("a", "b"), 0.0 * SECONDS, &mut delivery).is_some());
        assert!(registry.on_link(&link("b", "a"), 0.0 * SECONDS, &mut delivery).is_some());
        assert!(registry.on_link(&link("a", "c"), 0.0 * SECONDS, &mut delivery).is_some());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn lifetime_decays_then_expires() {
        let (mut registry, mut delivery) = setup();
        let (a, b) = (EntityId::from("a"), EntityId::from("b"));

        registry.on_link(&link("a", "b"), 0.0 * SECONDS, &mut delivery);

        let mut previous = registry.get(&a, &b).unwrap().lifetime;
        for _ in 0..4 {
            assert_eq!(registry.decay(), 0);
            let now = registry.get(&a, &b).unwrap().lifetime;
            assert_eq!(previous - now, 1.0 * SECONDS);
            previous = now;
        }

        // Fifth decay takes it to zero which removes it straight away
        assert_eq!(registry.decay(), 1);
        assert!(!registry.is_live(&a, &b));
        assert!(registry.is_empty());

        // Free to be created again afterwards
        assert!(registry.on_link(&link("a", "b"), 5.0 * SECONDS, &mut delivery).is_some());
    }

    #[test]
    fn fractional_decrement() {
        let config = SimConfig {
            communication_speed: 2.0,
            message_lifetime: 2.0 * SECONDS,
            ..SimConfig::meshed()
        };
        let mut registry =
            MessageRegistry::new(config.message_lifetime, config.lifetime_decrement());
        let mut delivery = DeliveryModel::from_seed(&config, 5).unwrap();

        registry.on_link(&link("a", "b"), 0.0 * SECONDS, &mut delivery);

        let mut ticks = 0;
        while !registry.is_empty() {
            registry.decay();
            ticks += 1;
        }
        assert_eq!(ticks, 4);
    }

    fn ticks_to_expire(communication_speed: f64, lifetime: Time) -> u32 {
        let config = SimConfig {
            communication_speed,
            message_lifetime: lifetime,
            ..SimConfig::meshed()
        };
        let mut registry =
            MessageRegistry::new(config.message_lifetime, config.lifetime_decrement());
        let mut delivery = DeliveryModel::from_seed(&config, 5).unwrap();

        registry.on_link(&link("a", "b"), 0.0 * SECONDS, &mut delivery);

        let mut ticks = 0;
        while !registry.is_empty() && ticks < 1000 {
            registry.decay();
            ticks += 1;
        }
        ticks
    }

    #[test]
    fn inexact_decrement_expires_on_time() {
        assert_eq!(ticks_to_expire(3.0, 1.0 * SECONDS), 3);
        assert_eq!(ticks_to_expire(10.0, 1.0 * SECONDS), 10);
        assert_eq!(ticks_to_expire(10.0, 5.0 * SECONDS), 50);
        assert_eq!(ticks_to_expire(49.0, 1.0 * SECONDS), 49);
        // Not a whole number of ticks, the last partial tick still counts
        assert_eq!(ticks_to_expire(4.0, 1.1 * SECONDS), 5);
    }

    #[test]
    fn age_counts_decays() {
        let (mut registry, mut delivery) = setup();
        let (a, b) = (EntityId::from("a"), EntityId::from("b"));

        registry.on_link(&link("a", "b"), 0.0 * SECONDS, &mut delivery);
        registry.decay();
        registry.on_link(&link("b", "a"), 1.0 * SECONDS, &mut delivery);
        registry.decay();

        assert_eq!(registry.get(&a, &b).unwrap().age, 2);
        assert_eq!(registry.get(&b, &a).unwrap().age, 1);
        assert_eq!(registry.get(&b, &a).unwrap().lifetime, 4.0 * SECONDS);
    }
}
