//! Resilience Module
//!
//! - `retry`: step-level retry policy

mod retry;

pub use retry::{RetryConfig, RetryPolicy};
