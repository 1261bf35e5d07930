use std::f64::consts::TAU;

use rand::Rng;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::{
    entity::EntityId,
    geometry::Point,
    mobility::Frame,
    scenario::ScenarioError,
    units::{Length, METRES, MPS, Speed, Time, Unit},
};

/// Vehicles never go slower than this on the highway, so every vehicle
/// eventually reaches the end of the road.
const MIN_HIGHWAY_SPEED: Speed = Speed::from_metres_per_second(1.0);

/// Stops generators with a tiny tick from producing enormous traces.
const MAX_FRAMES: usize = 1_000_000;

/// Vehicles enter a straight multi-lane road at `x = 0`, one every
/// `spawn_interval`, and leave once they pass `road_length`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighwayTraffic {
    pub road_length: Length,
    pub lanes: usize,
    pub lane_spacing: Length,
    pub vehicle_count: usize,
    pub spawn_interval: Time,
    /// Speeds are normally distributed and fixed per vehicle.
    pub mean_speed: Speed,
    pub std_speed: Speed,
    /// Time between frames
    pub tick: Time,
}

struct HighwayVehicle {
    id: EntityId,
    spawn: Time,
    lane: usize,
    speed: Speed,
}

impl HighwayTraffic {
    pub(super) fn generate(self, rng: &mut ChaCha12Rng) -> Result<Vec<Frame>, ScenarioError> {
        let HighwayTraffic {
            road_length,
            lanes,
            lane_spacing,
            vehicle_count,
            spawn_interval,
            mean_speed,
            std_speed,
            tick,
        } = self;

        check_tick(tick)?;

        if lanes == 0 {
            return Err(ScenarioError::InvalidParameter(
                "highway needs at least one lane".to_owned(),
            ));
        }

        let speed_dist = Normal::new(mean_speed.inner(), std_speed.inner())
            .map_err(|e| ScenarioError::InvalidParameter(format!("speed distribution: {e}")))?;

        let vehicles: Vec<HighwayVehicle> = (0..vehicle_count)
            .map(|n| HighwayVehicle {
                id: EntityId::new(format!("veh{n}")),
                spawn: spawn_interval * n as f64,
                lane: n % lanes,
                speed: (speed_dist.sample(rng) * MPS).max(MIN_HIGHWAY_SPEED),
            })
            .collect();

        let mut frames = Vec::new();

        for step in 1..=MAX_FRAMES {
            let time = tick * step as f64;

            let on_road: Vec<(EntityId, Point)> = vehicles
                .iter()
                .filter(|vehicle| vehicle.spawn <= time)
                .filter_map(|vehicle| {
                    let x = vehicle.speed * (time - vehicle.spawn);
                    (x <= road_length).then(|| {
                        let y = lane_spacing * vehicle.lane as f64;
                        (vehicle.id.clone(), Point { x, y })
                    })
                })
                .collect();

            let all_spawned = vehicles.last().map(|v| v.spawn <= time).unwrap_or(true);

            if on_road.is_empty() && all_spawned {
                break;
            }

            frames.push(Frame {
                time,
                vehicles: on_road,
            });
        }

        Ok(frames)
    }
}

/// Vehicles drift around a square, occasionally picking a new direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WanderingVehicles {
    pub vehicle_count: usize,
    pub side_len: Length,
    pub wander_speed: Speed,
    /// Chance per frame that a vehicle turns to a new random heading.
    pub turn_chance: f64,
    pub tick: Time,
    pub duration: Time,
}

impl WanderingVehicles {
    pub(super) fn generate(self, rng: &mut ChaCha12Rng) -> Result<Vec<Frame>, ScenarioError> {
        let WanderingVehicles {
            vehicle_count,
            side_len,
            wander_speed,
            turn_chance,
            tick,
            duration,
        } = self;

        check_tick(tick)?;

        if !(0.0..=1.0).contains(&turn_chance) {
            return Err(ScenarioError::InvalidParameter(format!(
                "turn_chance must be in [0, 1], got {turn_chance}"
            )));
        }

        let ids: Vec<EntityId> = (0..vehicle_count)
            .map(|n| EntityId::new(format!("veh{n}")))
            .collect();
        let mut points = pos_random_square(vehicle_count, side_len, rng);
        let mut directions: Vec<f64> = (0..vehicle_count)
            .map(|_| rng.random_range(0.0..TAU))
            .collect();

        let mut frames = Vec::new();

        for step in 1..=MAX_FRAMES {
            let time = tick * step as f64;
            if time > duration {
                break;
            }

            for (point, dir) in points.iter_mut().zip(directions.iter_mut()) {
                if rng.random_bool(turn_chance) {
                    *dir = rng.random_range(0.0..TAU);
                }

                *point = (*point + Point::from_angle_mag(*dir, wander_speed * tick))
                    .clamp_square(side_len);
            }

            frames.push(Frame {
                time,
                vehicles: ids.iter().cloned().zip(points.iter().copied()).collect(),
            });
        }

        Ok(frames)
    }
}

fn check_tick(tick: Time) -> Result<(), ScenarioError> {
    if tick.seconds() > 0.0 && tick.is_finite() {
        Ok(())
    } else {
        Err(ScenarioError::InvalidParameter(format!(
            "tick must be positive, got {tick} s"
        )))
    }
}

pub(super) fn pos_random_square(count: usize, side_len: Length, rng: &mut ChaCha12Rng) -> Vec<Point> {
    (0..count)
        .map(|_| Point {
            x: rng.random::<f64>() * side_len,
            y: rng.random::<f64>() * side_len,
        })
        .collect()
}

/// Roadside units spread evenly along the highway, centred in each section.
pub(super) fn roadside_positions(road_length: Length, spacing: Length) -> Vec<Point> {
    if !(spacing.metres() > 0.0) || !spacing.is_finite() {
        return Vec::new();
    }

    let count = (road_length / spacing).floor().max(1.0) as usize;

    (0..count)
        .map(|n| Point {
            x: spacing * (n as f64 + 0.5),
            y: 0.0 * METRES,
        })
        .collect()
}
