//! AST Module - step catalog types
//!
//! Contains parsed Rust types from the YAML step catalog:
//! - `mode`: Mode (vacation | home)
//! - `service`: ServiceId (`domain/operation`)
//! - `catalog`: StepCatalog, StepDef, ActionDef, Target
//!
//! These types represent the "what" - static configuration.
//! For execution, see the `runtime` module.

mod catalog;
mod mode;
mod service;

// Re-export all public types
pub use catalog::{ActionDef, IdList, StepCatalog, StepDef, Target};
pub use mode::Mode;
pub use service::ServiceId;
