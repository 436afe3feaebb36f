//! Store Module - run state management
//!
//! In-memory only: runs are kept for the process lifetime and lost on restart.
//!
//! Key types:
//! - `RunRegistry`: run map + single-flight guard
//! - `Run`: one execution of a mode
//! - `StepStatus` / `StepState`: per-step progress

mod registry;
mod run;

// Re-export all public types
pub use registry::RunRegistry;
pub use run::{Run, RunStatus, StepState, StepStatus};
