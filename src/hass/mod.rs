//! Hass Module - remote automation API
//!
//! - `client`: `AutomationApi` trait + reqwest `HassClient`
//! - `types`: `EntityState`
//! - `mock`: `MockApi` for tests and demos

mod client;
mod mock;
mod types;

pub use client::{AutomationApi, HassClient};
pub use mock::{MockApi, RecordedCall};
pub use types::EntityState;
