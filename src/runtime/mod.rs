//! Runtime Module - step execution
//!
//! Contains the runtime execution components:
//! - `engine`: process-wide service (start, status, active run, away mode)
//! - `runner`: sequential steps with retry loop
//! - `invoker`: one service call per action, dry-run bypass
//! - `verifier`: post-condition polling
//!
//! This module represents the "how" - runtime execution.
//! For static structure, see the `ast` module.

mod engine;
mod invoker;
mod runner;
mod verifier;

// Re-export public types
pub use engine::Engine;
pub use invoker::ActionInvoker;
pub use runner::StepRunner;
pub use verifier::{Expectation, StateVerifier, Verification, VerificationRule};
