//! Home Assistant REST payload types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// States that never satisfy a verification check
const UNAVAILABLE_STATES: [&str; 2] = ["unavailable", "unknown"];

/// Body of `GET /api/states/{entity_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    #[serde(default)]
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Entity is offline or has never reported
    pub fn is_unavailable(&self) -> bool {
        UNAVAILABLE_STATES.contains(&self.state.as_str())
    }

    pub fn is_on(&self) -> bool {
        self.state == "on"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_ha_state_body() {
        let body = json!({
            "entity_id": "climate.hall",
            "state": "heat",
            "attributes": {"temperature": 20.5, "preset_mode": "away"},
            "last_changed": "2024-01-01T00:00:00+00:00"
        });
        let state: EntityState = serde_json::from_value(body).unwrap();
        assert_eq!(state.state, "heat");
        assert_eq!(state.attribute("temperature"), Some(&json!(20.5)));
        assert!(!state.is_unavailable());
    }

    #[test]
    fn unavailable_and_unknown() {
        assert!(EntityState::new("a.b", "unavailable").is_unavailable());
        assert!(EntityState::new("a.b", "unknown").is_unavailable());
        assert!(!EntityState::new("a.b", "off").is_unavailable());
    }
}
