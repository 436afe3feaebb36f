//! State Verifier - confirm an action's side effect took hold
//!
//! Service calls are fire-and-forget at the HTTP layer and device state lags,
//! so after a call the target entities are polled until they match the
//! expected post-condition or the timeout elapses.
//!
//! Which post-condition applies is decided by an explicit rule table keyed on
//! `(domain, operation)`; services without a rule are not verified.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::ast::{ActionDef, ServiceId};
use crate::error::{HearthError, Mismatch, Result};
use crate::hass::{AutomationApi, EntityState};

/// How a service's effect shows up in entity state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerificationRule {
    /// Entity state equals a fixed string
    StateEquals(&'static str),
    /// Entity state ≈ numeric payload value
    StateApprox { payload_key: &'static str },
    /// Attribute equals payload value exactly
    AttributeEquals {
        attribute: &'static str,
        payload_key: &'static str,
    },
    /// Attribute ≈ numeric payload value
    AttributeApprox {
        attribute: &'static str,
        payload_key: &'static str,
    },
}

impl VerificationRule {
    /// Rule table
    pub fn for_service(service: &ServiceId) -> Option<Self> {
        match (service.domain(), service.operation()) {
            (_, "turn_on") => Some(Self::StateEquals("on")),
            (_, "turn_off") => Some(Self::StateEquals("off")),
            ("climate", "set_temperature") => Some(Self::AttributeApprox {
                attribute: "temperature",
                payload_key: "temperature",
            }),
            ("climate", "set_preset_mode") => Some(Self::AttributeEquals {
                attribute: "preset_mode",
                payload_key: "preset_mode",
            }),
            ("number", "set_value") => Some(Self::StateApprox {
                payload_key: "value",
            }),
            _ => None,
        }
    }
}

/// Concrete post-condition for one action
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    State(String),
    StateNumeric(f64),
    Attribute { name: String, value: Value },
    AttributeNumeric { name: String, value: f64 },
}

impl Expectation {
    /// Derive the expectation for a service call and its payload
    ///
    /// `None` when the service has no rule or the payload lacks the value.
    pub fn derive(service: &ServiceId, payload: &Map<String, Value>) -> Option<Self> {
        match VerificationRule::for_service(service)? {
            VerificationRule::StateEquals(state) => Some(Self::State(state.to_string())),
            VerificationRule::StateApprox { payload_key } => {
                payload.get(payload_key).and_then(as_number).map(Self::StateNumeric)
            }
            VerificationRule::AttributeEquals {
                attribute,
                payload_key,
            } => payload.get(payload_key).map(|value| Self::Attribute {
                name: attribute.to_string(),
                value: value.clone(),
            }),
            VerificationRule::AttributeApprox {
                attribute,
                payload_key,
            } => payload
                .get(payload_key)
                .and_then(as_number)
                .map(|value| Self::AttributeNumeric {
                    name: attribute.to_string(),
                    value,
                }),
        }
    }

    /// Human description of the expected value
    pub fn describe(&self) -> String {
        match self {
            Self::State(state) => format!("'{}'", state),
            Self::StateNumeric(value) => format!("≈ {}", value),
            Self::Attribute { name, value } => format!("{} = {}", name, display_value(value)),
            Self::AttributeNumeric { name, value } => format!("{} ≈ {}", name, value),
        }
    }

    /// Compare against a fetched state; `Some` describes the mismatch
    pub fn check(&self, state: &EntityState, tolerance: f64) -> Option<Mismatch> {
        let mismatch = |actual: String| Mismatch {
            entity_id: state.entity_id.clone(),
            expected: self.describe(),
            actual,
        };

        if state.is_unavailable() {
            return Some(mismatch(state.state.clone()));
        }

        match self {
            Self::State(expected) => (state.state != *expected).then(|| mismatch(state.state.clone())),
            Self::StateNumeric(expected) => match state.state.trim().parse::<f64>() {
                Ok(actual) if within(actual, *expected, tolerance) => None,
                _ => Some(mismatch(state.state.clone())),
            },
            Self::Attribute { name, value } => match state.attribute(name) {
                Some(actual) if actual == value => None,
                actual => Some(mismatch(attribute_text(actual))),
            },
            Self::AttributeNumeric { name, value } => {
                let actual = state.attribute(name);
                match actual.and_then(as_number) {
                    Some(n) if within(n, *value, tolerance) => None,
                    _ => Some(mismatch(attribute_text(actual))),
                }
            }
        }
    }
}

fn within(actual: f64, expected: f64, tolerance: f64) -> bool {
    (actual - expected).abs() <= tolerance
}

/// Numbers may arrive as JSON numbers or numeric strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn attribute_text(value: Option<&Value>) -> String {
    value.map(display_value).unwrap_or_else(|| "<missing>".to_string())
}

/// Result of a verification that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    /// All listed entities reached the expected state
    Passed(Vec<String>),
    /// Nothing to check (no rule, or no concrete entity)
    Skipped,
}

#[derive(Clone)]
pub struct StateVerifier {
    api: Arc<dyn AutomationApi>,
    interval: Duration,
    timeout: Duration,
    tolerance: f64,
}

impl StateVerifier {
    pub fn new(
        api: Arc<dyn AutomationApi>,
        interval: Duration,
        timeout: Duration,
        tolerance: f64,
    ) -> Self {
        Self {
            api,
            interval,
            timeout,
            tolerance,
        }
    }

    /// Poll the action's entities until they match or the timeout elapses
    #[instrument(skip(self, action), fields(service = %action.service))]
    pub async fn verify(&self, action: &ActionDef) -> Result<Verification> {
        let Some(expectation) = Expectation::derive(&action.service, &action.data) else {
            debug!("No verifiable condition");
            return Ok(Verification::Skipped);
        };

        let entities = action.verification_entities();
        if entities.is_empty() {
            debug!("Target is not an entity, skipping verification");
            return Ok(Verification::Skipped);
        }

        let timeout = action.verify_timeout().unwrap_or(self.timeout);
        let start = Instant::now();
        let mut pending = entities.clone();

        loop {
            let mismatches = self.poll_once(&pending, &expectation).await;
            if mismatches.is_empty() {
                debug!(?entities, "Verified");
                return Ok(Verification::Passed(entities));
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(HearthError::VerificationFailed {
                    timeout_ms: timeout.as_millis() as u64,
                    mismatches,
                });
            }

            pending = mismatches.into_iter().map(|m| m.entity_id).collect();
            tokio::time::sleep(self.interval.min(timeout - elapsed)).await;
        }
    }

    /// One poll tick over all pending entities (fetched concurrently)
    async fn poll_once(&self, entities: &[String], expectation: &Expectation) -> Vec<Mismatch> {
        let states = join_all(entities.iter().map(|id| self.api.get_state(id))).await;

        entities
            .iter()
            .zip(states)
            .filter_map(|(entity_id, state)| match state {
                Ok(mut state) => {
                    if state.entity_id.is_empty() {
                        state.entity_id = entity_id.clone();
                    }
                    expectation.check(&state, self.tolerance)
                }
                Err(e) => Some(Mismatch {
                    entity_id: entity_id.clone(),
                    expected: expectation.describe(),
                    actual: e.to_string(),
                }),
            })
            .collect()
    }
}

impl std::fmt::Debug for StateVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateVerifier")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hass::MockApi;
    use serde_json::json;

    fn svc(s: &str) -> ServiceId {
        s.parse().unwrap()
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn verifier(api: &MockApi) -> StateVerifier {
        StateVerifier::new(
            Arc::new(api.clone()),
            Duration::from_millis(10),
            Duration::from_millis(50),
            0.5,
        )
    }

    // ═══════════════════════════════════════════════════════════════
    // Rule table
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn rule_table() {
        assert_eq!(
            VerificationRule::for_service(&svc("light/turn_on")),
            Some(VerificationRule::StateEquals("on"))
        );
        assert_eq!(
            VerificationRule::for_service(&svc("switch/turn_off")),
            Some(VerificationRule::StateEquals("off"))
        );
        assert!(matches!(
            VerificationRule::for_service(&svc("climate/set_temperature")),
            Some(VerificationRule::AttributeApprox { .. })
        ));
        assert!(matches!(
            VerificationRule::for_service(&svc("number/set_value")),
            Some(VerificationRule::StateApprox { .. })
        ));
        assert_eq!(VerificationRule::for_service(&svc("lock/lock")), None);
        assert_eq!(VerificationRule::for_service(&svc("input_number/set_value")), None);
    }

    #[test]
    fn derive_requires_payload_value() {
        assert_eq!(
            Expectation::derive(&svc("climate/set_temperature"), &payload(json!({}))),
            None
        );
        assert_eq!(
            Expectation::derive(
                &svc("climate/set_temperature"),
                &payload(json!({"temperature": "20"}))
            ),
            Some(Expectation::AttributeNumeric {
                name: "temperature".into(),
                value: 20.0
            })
        );
        assert_eq!(
            Expectation::derive(&svc("number/set_value"), &payload(json!({"value": 3}))),
            Some(Expectation::StateNumeric(3.0))
        );
    }

    // ═══════════════════════════════════════════════════════════════
    // Checks
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn on_off_check() {
        let expect = Expectation::State("on".into());
        assert!(expect.check(&EntityState::new("switch.a", "on"), 0.5).is_none());

        let mismatch = expect.check(&EntityState::new("switch.a", "off"), 0.5).unwrap();
        assert_eq!(mismatch.to_string(), "switch.a is 'off' (expected 'on')");
    }

    #[test]
    fn numeric_tolerance() {
        let expect = Expectation::AttributeNumeric {
            name: "temperature".into(),
            value: 20.0,
        };
        let at = |t: f64| EntityState::new("climate.hall", "heat").with_attribute("temperature", t);

        assert!(expect.check(&at(20.4), 0.5).is_none());
        assert!(expect.check(&at(19.5), 0.5).is_none());
        assert!(expect.check(&at(21.0), 0.5).is_some());
    }

    #[test]
    fn state_numeric_parses_state_string() {
        let expect = Expectation::StateNumeric(50.0);
        assert!(expect.check(&EntityState::new("number.fan", "50.3"), 0.5).is_none());
        assert!(expect.check(&EntityState::new("number.fan", "abc"), 0.5).is_some());
    }

    #[test]
    fn preset_mode_is_exact() {
        let expect = Expectation::Attribute {
            name: "preset_mode".into(),
            value: json!("away"),
        };
        let with = |p: &str| EntityState::new("climate.hall", "heat").with_attribute("preset_mode", p);
        assert!(expect.check(&with("away"), 0.5).is_none());
        assert!(expect.check(&with("Away"), 0.5).is_some());

        let missing = expect
            .check(&EntityState::new("climate.hall", "heat"), 0.5)
            .unwrap();
        assert_eq!(missing.actual, "<missing>");
    }

    #[test]
    fn unavailable_always_fails() {
        let expect = Expectation::State("unavailable".into());
        assert!(expect
            .check(&EntityState::new("switch.a", "unavailable"), 0.5)
            .is_some());
        assert!(Expectation::State("off".into())
            .check(&EntityState::new("switch.a", "unknown"), 0.5)
            .is_some());
    }

    // ═══════════════════════════════════════════════════════════════
    // Polling
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn passes_when_state_matches() {
        let api = MockApi::new();
        api.set_state(EntityState::new("switch.a", "on"));
        let action = ActionDef::new(svc("switch/turn_on")).with_entity("switch.a");

        let outcome = verifier(&api).verify(&action).await.unwrap();
        assert_eq!(outcome, Verification::Passed(vec!["switch.a".into()]));
        assert_eq!(api.state_reads(), 1);
    }

    #[tokio::test]
    async fn times_out_listing_mismatches() {
        let api = MockApi::new();
        api.set_state(EntityState::new("switch.a", "on"));
        api.set_state(EntityState::new("switch.b", "off"));
        let mut action = ActionDef::new(svc("switch/turn_on"));
        action.entity_id = Some(crate::ast::IdList::Multiple(vec![
            "switch.a".into(),
            "switch.b".into(),
        ]));

        let err = verifier(&api).verify(&action).await.unwrap_err();
        match err {
            HearthError::VerificationFailed { mismatches, .. } => {
                assert_eq!(mismatches.len(), 1);
                assert_eq!(mismatches[0].entity_id, "switch.b");
                assert_eq!(mismatches[0].actual, "off");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(api.state_reads() > 2, "should re-poll before giving up");
    }

    #[tokio::test]
    async fn skips_unverifiable_service_and_area_targets() {
        let api = MockApi::new();
        let lock = ActionDef::new(svc("lock/lock")).with_entity("lock.front");
        assert_eq!(verifier(&api).verify(&lock).await.unwrap(), Verification::Skipped);

        let mut by_area = ActionDef::new(svc("light/turn_off"));
        by_area.area_id = Some(crate::ast::IdList::Single("kitchen".into()));
        assert_eq!(verifier(&api).verify(&by_area).await.unwrap(), Verification::Skipped);

        assert_eq!(api.state_reads(), 0);
    }

    #[tokio::test]
    async fn missing_entity_counts_as_mismatch() {
        let api = MockApi::new();
        let action = ActionDef::new(svc("light/turn_on")).with_entity("light.ghost");
        let err = verifier(&api).verify(&action).await.unwrap_err();
        assert!(err.to_string().contains("light.ghost"));
    }

    #[tokio::test]
    async fn per_action_timeout_override() {
        let api = MockApi::new();
        api.set_state(EntityState::new("switch.a", "off"));
        let mut action = ActionDef::new(svc("switch/turn_on")).with_entity("switch.a");
        action.verify_timeout = Some(0.0);

        let err = verifier(&api).verify(&action).await.unwrap_err();
        assert!(matches!(err, HearthError::VerificationFailed { timeout_ms: 0, .. }));
        assert_eq!(api.state_reads(), 1);
    }
}
