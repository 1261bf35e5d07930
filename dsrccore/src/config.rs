use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    entity::{Entity, EntityId},
    geometry::Point,
    link::LinkDetection,
    units::{Length, METRES, SECONDS, Time},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Roadside and vehicle contacts are logged directly from
    /// last contact timestamps. No message objects.
    #[default]
    Simple,
    /// Vehicle contacts create messages with a lifetime, a delay
    /// and a probabilistic delivery outcome.
    Meshed,
}

/// A fixed roadside unit placed by configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadsideUnit {
    pub id: EntityId,
    pub position: Point,
}

impl From<&RoadsideUnit> for Entity {
    fn from(value: &RoadsideUnit) -> Self {
        Entity::roadside_unit(value.id.clone(), value.position)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("rtv_radius must be positive and finite, got {0} m")]
    RtvRadius(Length),
    #[error("vtv_radius must be positive and finite, got {0} m")]
    VtvRadius(Length),
    #[error("communication_speed must be positive and finite, got {0}")]
    CommunicationSpeed(f64),
    #[error("message_lifetime must be positive and finite, got {0} s")]
    MessageLifetime(Time),
    #[error("message_delay_max must be finite and not negative, got {0} s")]
    MessageDelayMax(Time),
    #[error("delivery_probability must be in (0, 1], got {0}")]
    DeliveryProbability(f64),
    #[error("freshness_window must be finite and not negative, got {0} s")]
    FreshnessWindow(Time),
    #[error("roadside unit {0} has a non-finite position")]
    RoadsideUnitPosition(EntityId),
}

/// Run configuration.
///
/// Missing fields take the value from [`SimConfig::simple`] when deserialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub mode: Mode,

    /// Roadside unit to vehicle range.
    pub rtv_radius: Length,

    /// Vehicle to vehicle range.
    pub vtv_radius: Length,

    /// Abstract rate constant. Message lifetimes shrink by `1 / communication_speed`
    /// seconds per tick and real time pacing sleeps for the same amount.
    pub communication_speed: f64,

    pub message_lifetime: Time,

    /// Upper bound (exclusive) of the uniformly sampled message delay.
    pub message_delay_max: Time,

    /// Chance a created message counts as delivered.
    pub delivery_probability: f64,

    /// A vehicle is logged again by a roadside unit only once
    /// strictly more than this has passed since the last log.
    pub freshness_window: Time,

    pub roadside_units: Vec<RoadsideUnit>,

    pub link_detection: LinkDetection,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::simple()
    }
}

impl SimConfig {
    /// Settings of the roadside + vehicle logging run.
    ///
    /// ```
    /// # use dsrccore::config::*;
    /// # use dsrccore::units::*;
    /// let config = SimConfig::simple();
    /// assert_eq!(config.mode, Mode::Simple);
    /// assert_eq!(config.rtv_radius, 50.0 * METRES);
    /// assert_eq!(config.vtv_radius, 30.0 * METRES);
    /// assert_eq!(config.roadside_units.len(), 1);
    /// ```
    pub fn simple() -> Self {
        Self {
            mode: Mode::Simple,
            rtv_radius: 50.0 * METRES,
            vtv_radius: 30.0 * METRES,
            communication_speed: 1.0,
            message_lifetime: 5.0 * SECONDS,
            message_delay_max: Time::from_seconds(0.1),
            delivery_probability: 0.9,
            freshness_window: 1.0 * SECONDS,
            roadside_units: vec![RoadsideUnit {
                id: "RSU".into(),
                position: Point::new(50.0, 0.0),
            }],
            link_detection: LinkDetection::Naive,
        }
    }

    /// Settings of the meshed vehicle messaging run.
    ///
    /// ```
    /// # use dsrccore::config::*;
    /// # use dsrccore::units::*;
    /// let config = SimConfig::meshed();
    /// assert_eq!(config.mode, Mode::Meshed);
    /// assert_eq!(config.vtv_radius, 50.0 * METRES);
    /// assert_eq!(config.message_lifetime, 5.0 * SECONDS);
    /// assert_eq!(config.delivery_probability, 0.9);
    /// ```
    pub fn meshed() -> Self {
        Self {
            mode: Mode::Meshed,
            vtv_radius: 50.0 * METRES,
            ..Self::simple()
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Lifetime lost by every live message each tick.
    pub fn lifetime_decrement(&self) -> Time {
        Time::from_seconds(1.0 / self.communication_speed)
    }

    pub fn roadside_entities(&self) -> Vec<Entity> {
        self.roadside_units.iter().map(Entity::from).collect()
    }

    /// Rejects anything that would make the run meaningless.
    /// Values are never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |x: f64| x.is_finite() && x > 0.0;
        let non_negative = |x: f64| x.is_finite() && x >= 0.0;

        if !positive(self.rtv_radius.metres()) {
            return Err(ConfigError::RtvRadius(self.rtv_radius));
        }

        if !positive(self.vtv_radius.metres()) {
            return Err(ConfigError::VtvRadius(self.vtv_radius));
        }

        if !positive(self.communication_speed) {
            return Err(ConfigError::CommunicationSpeed(self.communication_speed));
        }

        if !positive(self.message_lifetime.seconds()) {
            return Err(ConfigError::MessageLifetime(self.message_lifetime));
        }

        if !non_negative(self.message_delay_max.seconds()) {
            return Err(ConfigError::MessageDelayMax(self.message_delay_max));
        }

        if !(self.delivery_probability > 0.0 && self.delivery_probability <= 1.0) {
            return Err(ConfigError::DeliveryProbability(self.delivery_probability));
        }

        if !non_negative(self.freshness_window.seconds()) {
            return Err(ConfigError::FreshnessWindow(self.freshness_window));
        }

        if let Some(rsu) = self
            .roadside_units
            .iter()
            .find(|rsu| !(rsu.position.x.is_finite() && rsu.position.y.is_finite()))
        {
            return Err(ConfigError::RoadsideUnitPosition(rsu.id.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert_eq!(SimConfig::simple().validate(), Ok(()));
        assert_eq!(SimConfig::meshed().validate(), Ok(()));
        assert_eq!(SimConfig::default(), SimConfig::simple());
    }

    #[test]
    fn rejects_non_positive() {
        let bad = SimConfig {
            rtv_radius: 0.0 * METRES,
            ..SimConfig::simple()
        };
        assert_eq!(bad.validate(), Err(ConfigError::RtvRadius(0.0 * METRES)));

        let bad = SimConfig {
            vtv_radius: -3.0 * METRES,
            ..SimConfig::simple()
        };
        assert_eq!(bad.validate(), Err(ConfigError::VtvRadius(-3.0 * METRES)));

        let bad = SimConfig {
            message_lifetime: 0.0 * SECONDS,
            ..SimConfig::meshed()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::MessageLifetime(_))));

        let bad = SimConfig {
            communication_speed: 0.0,
            ..SimConfig::meshed()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::CommunicationSpeed(_))));
    }

    #[test]
    fn rejects_bad_probability() {
        for p in [0.0, -0.1, 1.01, f64::NAN] {
            let bad = SimConfig {
                delivery_probability: p,
                ..SimConfig::meshed()
            };
            assert!(
                matches!(bad.validate(), Err(ConfigError::DeliveryProbability(_))),
                "{p} accepted"
            );
        }
    }

    #[test]
    fn rejects_non_finite_roadside_unit() {
        let bad = SimConfig {
            roadside_units: vec![RoadsideUnit {
                id: "broken".into(),
                position: Point::new(f64::INFINITY, 0.0),
            }],
            ..SimConfig::simple()
        };
        assert_eq!(
            bad.validate(),
            Err(ConfigError::RoadsideUnitPosition("broken".into()))
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{ "mode": "Meshed", "vtv_radius": 75.0 }"#).unwrap();

        assert_eq!(config.mode, Mode::Meshed);
        assert_eq!(config.vtv_radius, 75.0 * METRES);
        assert_eq!(config.rtv_radius, SimConfig::simple().rtv_radius);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn decrement_follows_speed() {
        let config = SimConfig {
            communication_speed: 4.0,
            ..SimConfig::meshed()
        };
        assert_eq!(config.lifetime_decrement(), Time::from_seconds(0.25));
    }
}
