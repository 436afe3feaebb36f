//! Event Module - per-run audit trail
//!
//! - `log`: Event, EventKind, EventLog

mod log;

pub use log::{Event, EventKind, EventLog};
