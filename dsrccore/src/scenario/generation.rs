pub mod positioning;

use positioning::{HighwayTraffic, WanderingVehicles, roadside_positions};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

use crate::{
    config::RoadsideUnit,
    entity::EntityId,
    mobility::Trace,
    scenario::{Scenario, ScenarioError, ScenarioIdentity},
    units::Length,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScenarioGenerator {
    Highway {
        traffic: HighwayTraffic,

        /// Place a roadside unit every this many metres along the road.
        /// `None` leaves roadside units to the run configuration.
        roadside_spacing: Option<Length>,
    },
    Wandering {
        movement: WanderingVehicles,
    },
}

impl ScenarioGenerator {
    pub fn generate_from_seed(&self, seed: u64) -> Result<Scenario, ScenarioError> {
        let rng = ChaCha12Rng::seed_from_u64(seed);
        self.generate(rng)
    }

    pub fn generate(&self, mut rng: ChaCha12Rng) -> Result<Scenario, ScenarioError> {
        match self.clone() {
            ScenarioGenerator::Highway {
                traffic,
                roadside_spacing,
            } => {
                let road_length = traffic.road_length;
                let frames = traffic.generate(&mut rng)?;

                let roadside_units = roadside_spacing
                    .map(|spacing| roadside_positions(road_length, spacing))
                    .unwrap_or_default()
                    .into_iter()
                    .enumerate()
                    .map(|(n, position)| RoadsideUnit {
                        id: EntityId::new(format!("RSU{n}")),
                        position,
                    })
                    .collect();

                Ok(Scenario {
                    identity: ScenarioIdentity::Custom,
                    trace: Trace::new(frames),
                    roadside_units,
                })
            }
            ScenarioGenerator::Wandering { movement } => {
                let frames = movement.generate(&mut rng)?;

                Ok(Scenario {
                    identity: ScenarioIdentity::Custom,
                    trace: Trace::new(frames),
                    roadside_units: Vec::new(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{METRES, MPS, SECONDS};

    fn highway(vehicle_count: usize) -> ScenarioGenerator {
        ScenarioGenerator::Highway {
            traffic: HighwayTraffic {
                road_length: 500.0 * METRES,
                lanes: 2,
                lane_spacing: 3.5 * METRES,
                vehicle_count,
                spawn_interval: 2.0 * SECONDS,
                mean_speed: 25.0 * MPS,
                std_speed: 3.0 * MPS,
                tick: 1.0 * SECONDS,
            },
            roadside_spacing: Some(200.0 * METRES),
        }
    }

    #[test]
    fn highway_vehicles_enter_and_leave() {
        let scenario = highway(10).generate_from_seed(11).unwrap();
        let frames = &scenario.trace.frames;

        assert!(!frames.is_empty());
        assert_eq!(scenario.trace.vehicle_ids().len(), 10);
        assert!(frames.last().unwrap().vehicles.len() < 10);

        for frame in frames.iter() {
            for (_, point) in frame.vehicles.iter() {
                assert!(point.x >= 0.0 * METRES && point.x <= 500.0 * METRES);
            }
        }

        for pair in frames.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }

        assert_eq!(scenario.roadside_units.len(), 2);
        assert_eq!(scenario.roadside_units[0].position.x, 100.0 * METRES);
    }

    #[test]
    fn regenerate_from_identity() {
        let identity = ScenarioIdentity::Generated {
            generator: highway(6),
            seed: 99,
        };

        let a = identity.create().unwrap();
        let b = identity.create().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.identity, identity);

        assert_eq!(
            ScenarioIdentity::Custom.create(),
            Err(ScenarioError::CustomNotRegenerable)
        );
    }

    #[test]
    fn wandering_stays_in_square() {
        let generator = ScenarioGenerator::Wandering {
            movement: WanderingVehicles {
                vehicle_count: 8,
                side_len: 300.0 * METRES,
                wander_speed: 15.0 * MPS,
                turn_chance: 0.1,
                tick: 1.0 * SECONDS,
                duration: 30.0 * SECONDS,
            },
        };

        let scenario = generator.generate_from_seed(3).unwrap();
        assert_eq!(scenario.trace.len(), 30);

        for frame in scenario.trace.frames.iter() {
            assert_eq!(frame.vehicles.len(), 8);
            for (_, point) in frame.vehicles.iter() {
                assert!(point.x >= 0.0 * METRES && point.x <= 300.0 * METRES);
                assert!(point.y >= 0.0 * METRES && point.y <= 300.0 * METRES);
            }
        }
    }

    #[test]
    fn rejects_bad_tick() {
        let ScenarioGenerator::Highway { mut traffic, .. } = highway(3) else {
            unreachable!()
        };
        traffic.tick = 0.0 * SECONDS;

        let generator = ScenarioGenerator::Highway {
            traffic,
            roadside_spacing: None,
        };
        assert!(matches!(
            generator.generate_from_seed(1),
            Err(ScenarioError::InvalidParameter(_))
        ));
    }
}
