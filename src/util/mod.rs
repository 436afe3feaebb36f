//! Utilities Module - shared infrastructure
//!
//! - `constants`: Centralized timeouts, retry and tolerance defaults
//! - `ids`: Precompiled validators for service and entity identifiers

pub mod constants;
mod ids;

// Re-export public types
pub use constants::{
    CONNECT_TIMEOUT, DRY_RUN_DELAY, ERROR_BODY_LIMIT, MAX_ACTION_WAIT, MAX_RETRIES, NUMERIC_TOLERANCE,
    REQUEST_TIMEOUT, RETRY_DELAY, VERIFY_POLL_INTERVAL, VERIFY_TIMEOUT,
};
pub use ids::{is_valid_entity_id, truncate_body};
