use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Opaque identifier handed out by the mobility provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId(value.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRole {
    Vehicle,
    RoadsideUnit,
}

/// Something that can take part in a link during a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub position: Point,
    pub role: EntityRole,
}

impl Entity {
    pub fn vehicle(id: impl Into<EntityId>, position: Point) -> Self {
        Entity {
            id: id.into(),
            position,
            role: EntityRole::Vehicle,
        }
    }

    pub fn roadside_unit(id: impl Into<EntityId>, position: Point) -> Self {
        Entity {
            id: id.into(),
            position,
            role: EntityRole::RoadsideUnit,
        }
    }
}
