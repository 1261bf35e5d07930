//! The engine's view of the traffic simulator.
//!
//! A [`MobilityProvider`] is asked for positions once per tick and is otherwise
//! treated as stateless. [`TraceMobility`] replays a precomputed [`Trace`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    entity::{Entity, EntityId},
    geometry::Point,
    units::Time,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MobilityError {
    /// Could not be reached or started.
    #[error("mobility provider unavailable: {0}")]
    Unavailable(String),
    /// Failed part way through a run.
    #[error("mobility provider failed: {0}")]
    Fault(String),
    #[error("no position for entity {0}")]
    UnknownEntity(EntityId),
}

pub trait MobilityProvider {
    /// Called once before the first tick.
    fn start(&mut self) -> Result<(), MobilityError> {
        Ok(())
    }

    /// Move the simulation forward by one step.
    fn advance(&mut self) -> Result<(), MobilityError>;

    /// Simulation time of the current step.
    fn sim_time(&self) -> Time;

    /// Vehicles present in the current step.
    fn entity_ids(&self) -> Vec<EntityId>;

    fn position(&self, id: &EntityId) -> Result<Point, MobilityError>;

    /// Roadside units known to the provider, in addition to configured ones.
    fn roadside_units(&self) -> Vec<Entity> {
        Vec::new()
    }

    /// True once no more entities are expected.
    fn is_finished(&self) -> bool;

    /// Cosmetic hint that `id` took part in a communication this step.
    fn mark_communicating(&mut self, _id: &EntityId) {}

    fn close(&mut self) {}
}

/// Vehicle positions at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub time: Time,
    pub vehicles: Vec<(EntityId, Point)>,
}

/// Time ordered sequence of frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub frames: Vec<Frame>,
}

impl Trace {
    pub fn new(frames: Vec<Frame>) -> Self {
        Trace { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// First frame that lists the same vehicle more than once.
    pub fn duplicate_vehicle(&self) -> Option<(Time, &EntityId)> {
        self.frames.iter().find_map(|frame| {
            let mut seen = HashSet::new();
            frame
                .vehicles
                .iter()
                .find(|(id, _)| !seen.insert(id))
                .map(|(id, _)| (frame.time, id))
        })
    }

    /// Every distinct vehicle id in the trace.
    pub fn vehicle_ids(&self) -> HashSet<EntityId> {
        self.frames
            .iter()
            .flat_map(|frame| frame.vehicles.iter().map(|(id, _)| id.clone()))
            .collect()
    }
}

/// Replays a [`Trace`] one frame per tick.
#[derive(Debug, Clone)]
pub struct TraceMobility {
    trace: Trace,
    roadside_units: Vec<Entity>,
    /// Index of the current frame, `None` before the first advance.
    cursor: Option<usize>,
    communicating: HashSet<EntityId>,
}

impl TraceMobility {
    pub fn new(trace: Trace, roadside_units: Vec<Entity>) -> Self {
        TraceMobility {
            trace,
            roadside_units,
            cursor: None,
            communicating: HashSet::new(),
        }
    }

    fn frame(&self) -> Option<&Frame> {
        self.cursor.and_then(|n| self.trace.frames.get(n))
    }

    /// Entities flagged with [`MobilityProvider::mark_communicating`] in the current frame.
    pub fn communicating(&self) -> &HashSet<EntityId> {
        &self.communicating
    }
}

impl MobilityProvider for TraceMobility {
    fn start(&mut self) -> Result<(), MobilityError> {
        let ordered = self
            .trace
            .frames
            .windows(2)
            .all(|pair| pair[0].time < pair[1].time);

        if !ordered {
            return Err(MobilityError::Unavailable(
                "trace frames are not in increasing time order".to_owned(),
            ));
        }

        if let Some((time, id)) = self.trace.duplicate_vehicle() {
            return Err(MobilityError::Unavailable(format!(
                "trace frame at {time} s lists vehicle {id} more than once"
            )));
        }

        Ok(())
    }

    fn advance(&mut self) -> Result<(), MobilityError> {
        let next = self.cursor.map(|n| n + 1).unwrap_or(0);

        if next >= self.trace.frames.len() {
            return Err(MobilityError::Fault(format!(
                "advanced past the end of the trace ({} frames)",
                self.trace.frames.len()
            )));
        }

        self.cursor = Some(next);
        self.communicating.clear();
        Ok(())
    }

    fn sim_time(&self) -> Time {
        self.frame().map(|frame| frame.time).unwrap_or(Time::ZERO)
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.frame()
            .map(|frame| frame.vehicles.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    fn position(&self, id: &EntityId) -> Result<Point, MobilityError> {
        self.frame()
            .and_then(|frame| frame.vehicles.iter().find(|(other, _)| other == id))
            .map(|(_, point)| *point)
            .ok_or_else(|| MobilityError::UnknownEntity(id.clone()))
    }

    fn roadside_units(&self) -> Vec<Entity> {
        self.roadside_units.clone()
    }

    fn is_finished(&self) -> bool {
        let next = self.cursor.map(|n| n + 1).unwrap_or(0);
        next >= self.trace.frames.len()
    }

    fn mark_communicating(&mut self, id: &EntityId) {
        self.communicating.insert(id.clone());
    }
}
