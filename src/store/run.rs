//! Run and step status records

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ast::{Mode, StepDef};
use crate::event::EventLog;

/// Lifecycle of one step within a run
///
/// `pending → running → (retrying → running)* → success | failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Retrying,
    Success,
    Failed,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Success | StepState::Failed)
    }

    /// Whether `self → next` is a legal transition (self-loops allowed for message updates)
    pub fn can_transition_to(&self, next: StepState) -> bool {
        use StepState::*;
        if *self == next {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Retrying)
                | (Running, Success)
                | (Running, Failed)
                | (Retrying, Running)
        )
    }
}

/// Display + progress record for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStatus {
    pub alias: String,
    pub icon: String,
    pub status: StepState,
    pub attempt: u32,
    pub error: Option<String>,
    /// Transient progress text, cleared at step end
    pub message: Option<String>,
}

impl StepStatus {
    pub fn pending(step: &StepDef) -> Self {
        Self {
            alias: step.alias.clone(),
            icon: step.icon.clone(),
            status: StepState::Pending,
            attempt: 0,
            error: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Complete,
}

/// One execution of a mode's step sequence
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub run_id: Arc<str>,
    pub mode: Mode,
    pub dry_run: bool,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepStatus>,
    #[serde(skip)]
    pub events: EventLog,
}

impl Run {
    pub fn new(run_id: Arc<str>, mode: Mode, dry_run: bool, steps: &[StepDef]) -> Self {
        Self {
            run_id,
            mode,
            dry_run,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            steps: steps.iter().map(StepStatus::pending).collect(),
            events: EventLog::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn succeeded(&self) -> usize {
        self.count(StepState::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(StepState::Failed)
    }

    fn count(&self, state: StepState) -> usize {
        self.steps.iter().filter(|s| s.status == state).count()
    }
}
