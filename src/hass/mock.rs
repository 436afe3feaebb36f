//! Mock automation API for testing
//!
//! Records every service call and serves scripted entity states without any
//! network I/O. Optionally simulates devices: a successful `turn_on`/`turn_off`
//! call flips the target entities' state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::ast::ServiceId;
use crate::error::{HearthError, Result};

use super::client::AutomationApi;
use super::types::EntityState;

/// A recorded service call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub service: ServiceId,
    pub body: Value,
}

impl RecordedCall {
    /// Entity ids in the body (string or list)
    pub fn entity_ids(&self) -> Vec<String> {
        ids_in(&self.body)
    }
}

fn ids_in(body: &Value) -> Vec<String> {
    match body.get("entity_id") {
        Some(Value::String(id)) => vec![id.clone()],
        Some(Value::Array(ids)) => ids
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<RecordedCall>,
    states: HashMap<String, EntityState>,
    /// Entity -> remaining failures (`None` = always fail)
    failing: HashMap<String, Option<usize>>,
    state_reads: usize,
}

impl MockState {
    /// Consume one scripted failure for `entity_id`, if any remain
    fn should_fail(&mut self, entity_id: &str) -> bool {
        match self.failing.get_mut(entity_id) {
            Some(None) => true,
            Some(Some(0)) | None => false,
            Some(Some(remaining)) => {
                *remaining -= 1;
                true
            }
        }
    }
}

/// Scriptable in-memory `AutomationApi`
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    inner: Arc<Mutex<MockState>>,
    simulate_devices: bool,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful on/off calls update the target entities' state
    pub fn with_simulated_devices(mut self) -> Self {
        self.simulate_devices = true;
        self
    }

    /// Set (or replace) an entity state
    pub fn set_state(&self, state: EntityState) {
        self.inner
            .lock()
            .states
            .insert(state.entity_id.clone(), state);
    }

    /// Calls whose body targets `entity_id` answer HTTP 500
    pub fn fail_calls_for(&self, entity_id: impl Into<String>) {
        self.inner.lock().failing.insert(entity_id.into(), None);
    }

    /// Like `fail_calls_for`, but only the next `times` calls fail
    pub fn fail_calls_for_n(&self, entity_id: impl Into<String>, times: usize) {
        self.inner.lock().failing.insert(entity_id.into(), Some(times));
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Number of calls whose body targeted `entity_id`
    pub fn calls_for(&self, entity_id: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.entity_ids().iter().any(|id| id == entity_id))
            .count()
    }

    pub fn state_reads(&self) -> usize {
        self.inner.lock().state_reads
    }
}

#[async_trait]
impl AutomationApi for MockApi {
    async fn call_service(&self, service: &ServiceId, body: &Value) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(RecordedCall {
            service: service.clone(),
            body: body.clone(),
        });

        let targets = ids_in(body);
        if let Some(bad) = targets.iter().find(|id| inner.should_fail(id)) {
            return Err(HearthError::ServiceRejected {
                service: service.to_string(),
                status: 500,
                body: format!("mock failure for {}", bad),
            });
        }

        if self.simulate_devices {
            let new_state = match service.operation() {
                "turn_on" => Some("on"),
                "turn_off" => Some("off"),
                _ => None,
            };
            if let Some(new_state) = new_state {
                for id in targets {
                    inner
                        .states
                        .insert(id.clone(), EntityState::new(id, new_state));
                }
            }
        }

        Ok(())
    }

    async fn get_state(&self, entity_id: &str) -> Result<EntityState> {
        let mut inner = self.inner.lock();
        inner.state_reads += 1;
        inner
            .states
            .get(entity_id)
            .cloned()
            .ok_or_else(|| HearthError::StateUnavailable {
                entity_id: entity_id.to_string(),
                status: 404,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_calls_and_fails_scripted_targets() {
        let api = MockApi::new();
        api.fail_calls_for("switch.b");
        let svc: ServiceId = "switch/turn_on".parse().unwrap();

        assert!(api
            .call_service(&svc, &json!({"entity_id": "switch.a"}))
            .await
            .is_ok());
        assert!(api
            .call_service(&svc, &json!({"entity_id": ["switch.b", "switch.c"]}))
            .await
            .is_err());

        assert_eq!(api.call_count(), 2);
        assert_eq!(api.calls_for("switch.c"), 1);
    }

    #[tokio::test]
    async fn counted_failures_run_out() {
        let api = MockApi::new();
        api.fail_calls_for_n("switch.a", 2);
        let svc: ServiceId = "switch/turn_on".parse().unwrap();
        let body = json!({"entity_id": "switch.a"});

        assert!(api.call_service(&svc, &body).await.is_err());
        assert!(api.call_service(&svc, &body).await.is_err());
        assert!(api.call_service(&svc, &body).await.is_ok());
        assert_eq!(api.calls_for("switch.a"), 3);
    }

    #[tokio::test]
    async fn simulated_devices_follow_calls() {
        let api = MockApi::new().with_simulated_devices();
        let svc: ServiceId = "light/turn_on".parse().unwrap();
        api.call_service(&svc, &json!({"entity_id": "light.a"}))
            .await
            .unwrap();

        assert_eq!(api.get_state("light.a").await.unwrap().state, "on");
        assert!(api.get_state("light.missing").await.is_err());
        assert_eq!(api.state_reads(), 2);
    }
}
