//! Per-run event log
//!
//! Append-only audit trail of what a run did, so a progress UI can show more
//! than the latest step status.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: run level, step level and action level variants
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ast::Mode;

/// Single event in a run's log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since run start (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        run_id: Arc<str>,
        mode: Mode,
        dry_run: bool,
        step_count: usize,
    },
    RunCompleted {
        succeeded: usize,
        failed: usize,
        total_duration_ms: u64,
    },

    // ═══════════════════════════════════════════
    // STEP LEVEL
    // ═══════════════════════════════════════════
    StepStarted {
        step: usize,
        alias: String,
        attempt: u32,
    },
    StepRetrying {
        step: usize,
        attempt: u32,
        error: String,
    },
    StepSucceeded {
        step: usize,
        attempts: u32,
        duration_ms: u64,
    },
    StepFailed {
        step: usize,
        attempts: u32,
        error: String,
    },

    // ═══════════════════════════════════════════
    // ACTION LEVEL
    // ═══════════════════════════════════════════
    ActionInvoked {
        step: usize,
        service: String,
        body: Value,
        dry_run: bool,
    },
    ActionFailed {
        step: usize,
        service: String,
        error: String,
    },
    VerificationPassed {
        step: usize,
        entities: Vec<String>,
    },
    VerificationFailed {
        step: usize,
        error: String,
    },
}

impl EventKind {
    /// Step index if event is step- or action-related
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::StepStarted { step, .. }
            | Self::StepRetrying { step, .. }
            | Self::StepSucceeded { step, .. }
            | Self::StepFailed { step, .. }
            | Self::ActionInvoked { step, .. }
            | Self::ActionFailed { step, .. }
            | Self::VerificationPassed { step, .. }
            | Self::VerificationFailed { step, .. } => Some(*step),
            Self::RunStarted { .. } | Self::RunCompleted { .. } => None,
        }
    }

    pub fn is_run_event(&self) -> bool {
        matches!(self, Self::RunStarted { .. } | Self::RunCompleted { .. })
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at run start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Filter events by step index
    pub fn filter_step(&self, step: usize) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.step() == Some(step))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}
