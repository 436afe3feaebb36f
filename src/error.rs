//! Error types with error codes and fix suggestions
//!
//! Error code ranges:
//! - HEARTH-000-009: Config errors
//! - HEARTH-010-019: Step catalog errors
//! - HEARTH-020-029: Run control errors (mode, registry, guard)
//! - HEARTH-030-039: Remote API errors (transport, rejection)
//! - HEARTH-040-049: Verification errors
//! - HEARTH-090-099: IO errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HearthError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// One entity that did not reach its expected post-condition
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub entity_id: String,
    pub expected: String,
    pub actual: String,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} is '{}' (expected {})",
            self.entity_id, self.actual, self.expected
        )
    }
}

fn format_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum HearthError {
    // ═══════════════════════════════════════════
    // CONFIG ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[HEARTH-001] Config error: {reason}")]
    ConfigError { reason: String },

    #[error("[HEARTH-002] Invalid Home Assistant URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("[HEARTH-003] Missing Home Assistant token")]
    MissingToken,

    // ═══════════════════════════════════════════
    // CATALOG ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[HEARTH-010] Failed to parse step catalog: {details}")]
    CatalogParse { details: String },

    #[error("[HEARTH-011] Invalid service '{service}': expected 'domain/operation'")]
    InvalidService { service: String },

    #[error("[HEARTH-012] Step '{step}' action {index} sets more than one target ({keys})")]
    ConflictingTargets {
        step: String,
        index: usize,
        keys: String,
    },

    #[error("[HEARTH-013] Invalid entity id '{entity_id}'")]
    InvalidEntityId { entity_id: String },

    // ═══════════════════════════════════════════
    // RUN CONTROL ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[HEARTH-020] Invalid mode '{mode}': expected 'vacation' or 'home'")]
    InvalidMode { mode: String },

    #[error("[HEARTH-021] Run '{run_id}' not found")]
    RunNotFound { run_id: String },

    #[error("[HEARTH-022] Execution already in progress (run '{active_run}')")]
    AlreadyRunning { active_run: String },

    #[error("[HEARTH-023] Invalid request body: {details}")]
    InvalidRequest { details: String },

    // ═══════════════════════════════════════════
    // REMOTE API ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[HEARTH-030] Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("[HEARTH-031] {service} rejected with HTTP {status}: {body}")]
    ServiceRejected {
        service: String,
        status: u16,
        body: String,
    },

    #[error("[HEARTH-032] Unexpected HTTP {status} reading state of {entity_id}")]
    StateUnavailable { entity_id: String, status: u16 },

    #[error("[HEARTH-033] Invalid response from {url}: {details}")]
    InvalidResponse { url: String, details: String },

    // ═══════════════════════════════════════════
    // VERIFICATION ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[HEARTH-040] Verification timed out after {timeout_ms}ms: {}", format_mismatches(.mismatches))]
    VerificationFailed {
        timeout_ms: u64,
        mismatches: Vec<Mismatch>,
    },

    // ═══════════════════════════════════════════
    // IO ERRORS (090-099)
    // ═══════════════════════════════════════════
    #[error("[HEARTH-090] IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HearthError {
    /// Get the error code (e.g., "HEARTH-020")
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError { .. } => "HEARTH-001",
            Self::InvalidBaseUrl { .. } => "HEARTH-002",
            Self::MissingToken => "HEARTH-003",
            Self::CatalogParse { .. } => "HEARTH-010",
            Self::InvalidService { .. } => "HEARTH-011",
            Self::ConflictingTargets { .. } => "HEARTH-012",
            Self::InvalidEntityId { .. } => "HEARTH-013",
            Self::InvalidMode { .. } => "HEARTH-020",
            Self::RunNotFound { .. } => "HEARTH-021",
            Self::AlreadyRunning { .. } => "HEARTH-022",
            Self::InvalidRequest { .. } => "HEARTH-023",
            Self::Transport { .. } => "HEARTH-030",
            Self::ServiceRejected { .. } => "HEARTH-031",
            Self::StateUnavailable { .. } => "HEARTH-032",
            Self::InvalidResponse { .. } => "HEARTH-033",
            Self::VerificationFailed { .. } => "HEARTH-040",
            Self::Io(_) => "HEARTH-090",
        }
    }

    /// HTTP status the control surface answers with for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidMode { .. } | Self::InvalidRequest { .. } => 400,
            Self::RunNotFound { .. } => 404,
            Self::AlreadyRunning { .. } => 409,
            Self::Transport { .. }
            | Self::ServiceRejected { .. }
            | Self::StateUnavailable { .. }
            | Self::InvalidResponse { .. }
            | Self::VerificationFailed { .. } => 502,
            _ => 500,
        }
    }
}

impl FixSuggestion for HearthError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            HearthError::ConfigError { .. } => Some("Check ~/.config/hearth/config.toml syntax"),
            HearthError::InvalidBaseUrl { .. } => {
                Some("Use a full URL such as http://homeassistant.local:8123")
            }
            HearthError::MissingToken => {
                Some("Set HASS_TOKEN or [hass].token to a long-lived access token")
            }
            HearthError::CatalogParse { .. } => {
                Some("Check YAML syntax: vacation_steps/home_steps lists of steps")
            }
            HearthError::InvalidService { .. } => Some("Use format: domain/operation (e.g. light/turn_on)"),
            HearthError::ConflictingTargets { .. } => {
                Some("Keep only one of entity_id, device_id or area_id per action")
            }
            HearthError::InvalidEntityId { .. } => Some("Use format: domain.object_id"),
            HearthError::InvalidMode { .. } => Some("Pass 'vacation' or 'home'"),
            HearthError::RunNotFound { .. } => {
                Some("Runs are kept in memory only; they are lost on restart")
            }
            HearthError::AlreadyRunning { .. } => Some("Wait for the active run to complete"),
            HearthError::InvalidRequest { .. } => {
                Some("Send JSON like {\"mode\": \"vacation\", \"dry_run\": false}")
            }
            HearthError::Transport { .. } => Some("Check Home Assistant is reachable from this host"),
            HearthError::ServiceRejected { .. } => {
                Some("Check the service name and payload in the step catalog")
            }
            HearthError::StateUnavailable { .. } => Some("Verify the entity id exists"),
            HearthError::InvalidResponse { .. } => None,
            HearthError::VerificationFailed { .. } => {
                Some("Raise verify_timeout for slow devices or fix the device")
            }
            HearthError::Io(_) => Some("Check file path and permissions"),
        }
    }
}
