use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Construction-time settings for a [World](crate::World)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// First id handed out by `create_entity`
    pub first_entity_id: Entity,
    pub entity_capacity: usize,
    pub event_capacity: usize,
}

impl WorldConfig {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            first_entity_id: 1,
            entity_capacity: 32,
            event_capacity: 64,
        }
    }
}
