//! Centralized constants for the execution engine
//!
//! All timeout, retry and tolerance defaults in one place for easy tuning.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// HTTP Client
// ═══════════════════════════════════════════════════════════════

/// Timeout for a single Home Assistant REST call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for establishing HTTP connections
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum response body length kept in a service rejection error
pub const ERROR_BODY_LIMIT: usize = 200;

// ═══════════════════════════════════════════════════════════════
// Step Retry
// ═══════════════════════════════════════════════════════════════

/// Extra attempts after the first one fails
pub const MAX_RETRIES: u32 = 2;

/// Pause between two attempts of the same step
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

// ═══════════════════════════════════════════════════════════════
// State Verification
// ═══════════════════════════════════════════════════════════════

/// Interval between two state polls
pub const VERIFY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on verification polling, measured from its start
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// Fuzz margin for numeric comparisons (°C/°F round-trips)
pub const NUMERIC_TOLERANCE: f64 = 0.5;

/// Simulated latency of a dry-run action
pub const DRY_RUN_DELAY: Duration = Duration::from_millis(300);

/// Upper bound for a catalog action's `delay` and `verify_timeout`
pub const MAX_ACTION_WAIT: Duration = Duration::from_secs(3600);

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_wait_cap_exceeds_defaults() {
        assert!(MAX_ACTION_WAIT > VERIFY_TIMEOUT);
        assert!(MAX_ACTION_WAIT > RETRY_DELAY);
    }

    #[test]
    fn verify_timeout_allows_at_least_one_repoll() {
        assert!(VERIFY_TIMEOUT >= VERIFY_POLL_INTERVAL);
    }

    #[test]
    fn connect_timeout_is_shortest() {
        assert!(CONNECT_TIMEOUT < REQUEST_TIMEOUT);
    }

    #[test]
    fn retry_defaults() {
        const _: () = assert!(MAX_RETRIES == 2);
        assert!(NUMERIC_TOLERANCE > 0.0);
    }
}
