//! Action Invoker - one remote service call per action
//!
//! Builds the request body (payload + exactly one target key, nulls stripped)
//! and either sends it or, in dry-run mode, sleeps to simulate latency.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::ast::ActionDef;
use crate::error::Result;
use crate::hass::AutomationApi;

/// Keys that select what a service call acts on
const TARGET_KEYS: [&str; 3] = ["entity_id", "device_id", "area_id"];

#[derive(Clone)]
pub struct ActionInvoker {
    api: Arc<dyn AutomationApi>,
    dry_run_delay: Duration,
}

impl ActionInvoker {
    pub fn new(api: Arc<dyn AutomationApi>, dry_run_delay: Duration) -> Self {
        Self { api, dry_run_delay }
    }

    /// JSON body for the service call
    pub fn build_body(action: &ActionDef) -> Value {
        let mut body = action.data.clone();
        if let Some(target) = action.target() {
            for key in TARGET_KEYS {
                body.remove(key);
            }
            body.insert(target.key().to_string(), target.to_value());
        }
        body.retain(|_, v| !v.is_null());
        Value::Object(body)
    }

    /// Perform the call, returning the body that was (or would have been) sent
    #[instrument(skip(self, action), fields(service = %action.service))]
    pub async fn invoke(&self, action: &ActionDef, dry_run: bool) -> Result<Value> {
        let body = Self::build_body(action);

        if dry_run {
            debug!(%body, "Dry run, skipping service call");
            tokio::time::sleep(self.dry_run_delay).await;
            return Ok(body);
        }

        self.api.call_service(&action.service, &body).await?;
        Ok(body)
    }
}

impl std::fmt::Debug for ActionInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionInvoker")
            .field("dry_run_delay", &self.dry_run_delay)
            .finish()
    }
}
