//! Hearth - vacation/home step execution engine for Home Assistant
//!
//! # Architecture
//!
//! The codebase is organized in layers:
//!
//! - **ast**: Step catalog types (modes, steps, actions, service ids)
//! - **hass**: Remote automation API seam (`AutomationApi`, REST client, mock)
//! - **runtime**: Engine, step runner, action invoker, state verifier
//! - **store**: Run registry and single-flight guard
//! - **event**: Per-run audit trail
//! - **resilience**: Retry policy
//! - **server**: HTTP control surface
//! - **util**: Constants and small helpers
//!
//! Supporting modules:
//! - **config**: TOML configuration with env overrides
//! - **error**: Error types with fix suggestions

// Layered modules
pub mod ast;
pub mod event;
pub mod hass;
pub mod resilience;
pub mod runtime;
pub mod server;
pub mod store;
pub mod util;

// Supporting modules
pub mod config;
pub mod error;

// Re-exports for convenience
pub use ast::{ActionDef, Mode, ServiceId, StepCatalog, StepDef};
pub use config::HearthConfig;
pub use error::{FixSuggestion, HearthError, Result};
pub use event::{Event, EventKind, EventLog};
pub use hass::{AutomationApi, EntityState, HassClient, MockApi};
pub use runtime::Engine;
pub use store::{Run, RunRegistry, RunStatus, StepState, StepStatus};
