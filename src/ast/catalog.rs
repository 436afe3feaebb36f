//! Step catalog parsing structures
//!
//! The catalog is read-only configuration: an ordered list of steps per mode,
//! each step a group of service calls executed under one retry policy.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HearthError, Result};
use crate::util::{is_valid_entity_id, MAX_ACTION_WAIT};

use super::mode::Mode;
use super::service::ServiceId;

/// Handles string OR array for id fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdList {
    Single(String),
    Multiple(Vec<String>),
}

impl IdList {
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            IdList::Single(s) => vec![s.as_str()],
            IdList::Multiple(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }

    fn to_owned_vec(&self) -> Vec<String> {
        self.as_vec().into_iter().map(str::to_string).collect()
    }
}

/// Resolved target of a service call: exactly one key ends up in the body
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Entity(Vec<String>),
    Device(Vec<String>),
    Area(Vec<String>),
}

impl Target {
    /// JSON key this target is sent under
    pub fn key(&self) -> &'static str {
        match self {
            Target::Entity(_) => "entity_id",
            Target::Device(_) => "device_id",
            Target::Area(_) => "area_id",
        }
    }

    pub fn ids(&self) -> &[String] {
        match self {
            Target::Entity(ids) | Target::Device(ids) | Target::Area(ids) => ids,
        }
    }

    /// A single id is sent as a string, several as a list
    pub fn to_value(&self) -> Value {
        match self.ids() {
            [one] => Value::String(one.clone()),
            many => Value::Array(many.iter().cloned().map(Value::String).collect()),
        }
    }
}

/// One service call inside a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    pub service: ServiceId,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<IdList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<IdList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<IdList>,
    /// Entity polled for verification instead of the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_entity: Option<IdList>,
    /// Seconds to wait after the action completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Seconds, overrides the engine-wide verification timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_timeout: Option<f64>,
}

impl ActionDef {
    /// Create a bare action (builder entry point, mostly for tests)
    pub fn new(service: ServiceId) -> Self {
        Self {
            service,
            data: Map::new(),
            entity_id: None,
            device_id: None,
            area_id: None,
            verify_entity: None,
            delay: None,
            description: None,
            verify_timeout: None,
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(IdList::Single(entity_id.into()));
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Target override, highest priority first: entity, device, area
    pub fn target(&self) -> Option<Target> {
        if let Some(ids) = &self.entity_id {
            return Some(Target::Entity(ids.to_owned_vec()));
        }
        if let Some(ids) = &self.device_id {
            return Some(Target::Device(ids.to_owned_vec()));
        }
        self.area_id
            .as_ref()
            .map(|ids| Target::Area(ids.to_owned_vec()))
    }

    /// Entities whose state can be polled after the call
    ///
    /// Empty when the action only targets devices or areas.
    pub fn verification_entities(&self) -> Vec<String> {
        if let Some(ids) = &self.verify_entity {
            return ids.to_owned_vec();
        }
        match self.target() {
            Some(Target::Entity(ids)) => ids,
            Some(_) => Vec::new(),
            None => match self.data.get("entity_id") {
                Some(Value::String(id)) => vec![id.clone()],
                Some(Value::Array(ids)) => ids
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }

    /// Short human label used in error messages
    pub fn label(&self) -> String {
        let ids = match self.target() {
            Some(target) => target.ids().to_vec(),
            None => self.verification_entities(),
        };
        if ids.is_empty() {
            self.service.to_string()
        } else {
            ids.join(", ")
        }
    }

    /// Progress text shown while the action runs
    pub fn progress_message(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Calling {}", self.service))
    }

    /// Pause after the action, if any
    pub fn post_delay(&self) -> Option<Duration> {
        self.delay
            .and_then(seconds_to_duration)
            .filter(|d| !d.is_zero())
    }

    /// Per-action verification bound, overriding the engine default
    pub fn verify_timeout(&self) -> Option<Duration> {
        self.verify_timeout.and_then(seconds_to_duration)
    }

    fn validate(&self, step: &str, index: usize) -> Result<()> {
        let set: Vec<&str> = [
            ("entity_id", self.entity_id.is_some()),
            ("device_id", self.device_id.is_some()),
            ("area_id", self.area_id.is_some()),
        ]
        .into_iter()
        .filter_map(|(key, present)| present.then_some(key))
        .collect();

        if set.len() > 1 {
            return Err(HearthError::ConflictingTargets {
                step: step.to_string(),
                index,
                keys: set.join(", "),
            });
        }

        for id in self
            .entity_id
            .iter()
            .chain(self.verify_entity.iter())
            .flat_map(IdList::as_vec)
        {
            if !is_valid_entity_id(id) {
                return Err(HearthError::InvalidEntityId {
                    entity_id: id.to_string(),
                });
            }
        }

        for (name, secs) in [("delay", self.delay), ("verify_timeout", self.verify_timeout)] {
            if secs.is_some_and(|s| seconds_to_duration(s).is_none()) {
                return Err(HearthError::CatalogParse {
                    details: format!(
                        "step '{}' action {}: {} must be between 0 and {} seconds",
                        step,
                        index,
                        name,
                        MAX_ACTION_WAIT.as_secs()
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Seconds from the catalog as a `Duration`, `None` when negative or above the cap
fn seconds_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| *d <= MAX_ACTION_WAIT)
}

fn default_icon() -> String {
    "mdi:cog".to_string()
}

/// A named group of actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub alias: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
}

impl StepDef {
    pub fn new(alias: impl Into<String>, actions: Vec<ActionDef>) -> Self {
        Self {
            alias: alias.into(),
            icon: default_icon(),
            actions,
        }
    }
}

/// Ordered step lists for each mode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepCatalog {
    #[serde(default)]
    pub vacation_steps: Vec<StepDef>,
    #[serde(default)]
    pub home_steps: Vec<StepDef>,
}

impl StepCatalog {
    /// Parse and validate a YAML catalog
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: StepCatalog =
            serde_yaml::from_str(yaml).map_err(|e| HearthError::CatalogParse {
                details: e.to_string(),
            })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read, parse and validate a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| HearthError::CatalogParse {
            details: format!("{}: {}", path.display(), e),
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn steps(&self, mode: Mode) -> &[StepDef] {
        match mode {
            Mode::Vacation => &self.vacation_steps,
            Mode::Home => &self.home_steps,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for step in self.vacation_steps.iter().chain(self.home_steps.iter()) {
            for (index, action) in step.actions.iter().enumerate() {
                action.validate(&step.alias, index)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATALOG: &str = r#"
vacation_steps:
  - alias: Lights off
    icon: mdi:lightbulb-off
    actions:
      - service: light/turn_off
        entity_id: [light.porch, light.hall]
        description: Turning lights off
  - alias: Thermostat setback
    actions:
      - service: climate/set_temperature
        data:
          entity_id: climate.hall
          temperature: 16
        delay: 1.5
home_steps:
  - alias: Kitchen
    actions:
      - service: light/turn_on
        area_id: kitchen
"#;

    #[test]
    fn parse_catalog() {
        let catalog = StepCatalog::from_yaml(CATALOG).unwrap();
        assert_eq!(catalog.steps(Mode::Vacation).len(), 2);
        assert_eq!(catalog.steps(Mode::Home).len(), 1);

        let lights = &catalog.vacation_steps[0];
        assert_eq!(lights.icon, "mdi:lightbulb-off");
        assert_eq!(
            lights.actions[0].target(),
            Some(Target::Entity(vec![
                "light.porch".to_string(),
                "light.hall".to_string()
            ]))
        );

        let setback = &catalog.vacation_steps[1];
        assert_eq!(setback.icon, "mdi:cog");
        assert_eq!(setback.actions[0].delay, Some(1.5));
        assert_eq!(setback.actions[0].data["temperature"], json!(16));
    }

    #[test]
    fn missing_mode_list_defaults_to_empty() {
        let catalog = StepCatalog::from_yaml("home_steps: []").unwrap();
        assert!(catalog.steps(Mode::Vacation).is_empty());
    }

    #[test]
    fn rejects_conflicting_targets() {
        let yaml = r#"
home_steps:
  - alias: Bad
    actions:
      - service: light/turn_on
        entity_id: light.a
        area_id: kitchen
"#;
        let err = StepCatalog::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, HearthError::ConflictingTargets { index: 0, .. }));
    }

    #[test]
    fn rejects_out_of_range_waits() {
        for field in ["delay", "verify_timeout"] {
            for value in ["1.0e20", "-1", ".nan", "3601"] {
                let yaml = format!(
                    "home_steps:\n  - alias: Lock\n    actions:\n      - service: lock/lock\n        entity_id: lock.front\n        {}: {}\n",
                    field, value
                );
                assert!(
                    matches!(StepCatalog::from_yaml(&yaml), Err(HearthError::CatalogParse { .. })),
                    "{field}: {value} should be rejected"
                );
            }
        }
    }

    #[test]
    fn wait_accessors_convert_seconds() {
        let mut action = ActionDef::new("lock/lock".parse().unwrap()).with_entity("lock.front");
        assert_eq!(action.post_delay(), None);

        action.delay = Some(0.0);
        assert_eq!(action.post_delay(), None);

        action.delay = Some(1.5);
        action.verify_timeout = Some(5.0);
        assert_eq!(action.post_delay(), Some(Duration::from_millis(1500)));
        assert_eq!(action.verify_timeout(), Some(Duration::from_secs(5)));

        // built in code, never validated
        action.delay = Some(1.0e20);
        action.verify_timeout = Some(f64::NAN);
        assert_eq!(action.post_delay(), None);
        assert_eq!(action.verify_timeout(), None);
    }

    #[test]
    fn rejects_bad_service_and_entity() {
        let bad_service = "home_steps:\n  - alias: x\n    actions:\n      - service: light.turn_on\n";
        assert!(StepCatalog::from_yaml(bad_service).is_err());

        let bad_entity =
            "home_steps:\n  - alias: x\n    actions:\n      - service: light/turn_on\n        entity_id: porch\n";
        assert!(matches!(
            StepCatalog::from_yaml(bad_entity),
            Err(HearthError::InvalidEntityId { .. })
        ));
    }

    #[test]
    fn target_priority_entity_over_device_over_area() {
        let mut action = ActionDef::new("light/turn_on".parse().unwrap());
        action.area_id = Some(IdList::Single("kitchen".into()));
        assert_eq!(action.target().unwrap().key(), "area_id");

        action.device_id = Some(IdList::Single("abc123".into()));
        assert_eq!(action.target().unwrap().key(), "device_id");

        action.entity_id = Some(IdList::Single("light.a".into()));
        assert_eq!(action.target().unwrap().key(), "entity_id");
    }

    #[test]
    fn verification_entities_resolution() {
        let svc: ServiceId = "light/turn_on".parse().unwrap();

        let explicit = ActionDef::new(svc.clone()).with_entity("light.a");
        assert_eq!(explicit.verification_entities(), vec!["light.a"]);

        let from_data = ActionDef::new(svc.clone()).with_data("entity_id", "light.b");
        assert_eq!(from_data.verification_entities(), vec!["light.b"]);

        let mut by_area = ActionDef::new(svc.clone());
        by_area.area_id = Some(IdList::Single("kitchen".into()));
        assert!(by_area.verification_entities().is_empty());

        by_area.verify_entity = Some(IdList::Single("light.kitchen".into()));
        assert_eq!(by_area.verification_entities(), vec!["light.kitchen"]);
    }

    #[test]
    fn target_value_shape() {
        assert_eq!(Target::Entity(vec!["a.b".into()]).to_value(), json!("a.b"));
        assert_eq!(
            Target::Area(vec!["x".into(), "y".into()]).to_value(),
            json!(["x", "y"])
        );
    }

    #[test]
    fn progress_message_defaults_to_service() {
        let action = ActionDef::new("lock/lock".parse().unwrap());
        assert_eq!(action.progress_message(), "Calling lock/lock");
        assert_eq!(action.label(), "lock/lock");
    }
}
