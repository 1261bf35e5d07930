pub mod generation;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::RoadsideUnit,
    entity::Entity,
    mobility::{Trace, TraceMobility},
    scenario::generation::ScenarioGenerator,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("cannot regenerate a custom scenario")]
    CustomNotRegenerable,
    #[error("invalid generator parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScenarioIdentity {
    Generated {
        generator: ScenarioGenerator,
        seed: u64,
    },
    /// A hand made or imported trace
    Custom,
}

impl ScenarioIdentity {
    pub fn create(&self) -> Result<Scenario, ScenarioError> {
        match self {
            ScenarioIdentity::Custom => Err(ScenarioError::CustomNotRegenerable),
            ScenarioIdentity::Generated { generator, seed } => {
                let mut output = generator.generate_from_seed(*seed)?;
                output.identity = self.clone();
                Ok(output)
            }
        }
    }
}

/// Everything the engine needs from the traffic side for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    // Regeneration
    pub identity: ScenarioIdentity,

    // Data values
    pub trace: Trace,
    /// Roadside units that belong to the road layout rather than the run configuration.
    #[serde(default)]
    pub roadside_units: Vec<RoadsideUnit>,
}

impl Scenario {
    pub fn custom(trace: Trace) -> Self {
        Scenario {
            identity: ScenarioIdentity::Custom,
            trace,
            roadside_units: Vec::new(),
        }
    }

    pub fn with_roadside_unit(mut self, unit: RoadsideUnit) -> Self {
        self.roadside_units.push(unit);
        self
    }

    pub fn mobility(&self) -> TraceMobility {
        TraceMobility::new(
            self.trace.clone(),
            self.roadside_units.iter().map(Entity::from).collect(),
        )
    }

    pub fn into_mobility(self) -> TraceMobility {
        let roadside_units = self.roadside_units.iter().map(Entity::from).collect();
        TraceMobility::new(self.trace, roadside_units)
    }
}
