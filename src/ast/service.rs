//! Service identifiers (`domain/operation`)

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::HearthError;

/// Pattern for `domain/operation` service ids
static SERVICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9_]+)/([a-z0-9_]+)$").unwrap());

/// A Home Assistant service, split once at parse time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    domain: String,
    operation: String,
}

impl ServiceId {
    pub fn new(domain: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            operation: operation.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// REST path for calling this service
    pub fn api_path(&self) -> String {
        format!("/api/services/{}/{}", self.domain, self.operation)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.operation)
    }
}

impl FromStr for ServiceId {
    type Err = HearthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = SERVICE_PATTERN
            .captures(s.trim())
            .ok_or_else(|| HearthError::InvalidService {
                service: s.to_string(),
            })?;
        Ok(Self::new(&caps[1], &caps[2]))
    }
}

impl Serialize for ServiceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ServiceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
