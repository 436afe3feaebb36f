//! RunRegistry - in-memory run store with single-flight guard
//!
//! Runs live in a DashMap for lock-free polling. The guard is a mutex around the
//! id of the active run: creating a run and releasing the guard both happen
//! inside that critical section, so "guard free" always implies "no run
//! shows `running`".

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;

use crate::ast::{Mode, StepDef};
use crate::error::{HearthError, Result};

use super::run::{Run, RunStatus, StepState, StepStatus};

/// Length of generated run ids
const RUN_ID_LEN: usize = 8;

/// Process-wide run store (cheap to clone, shared state)
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<DashMap<Arc<str>, Run>>,
    active: Arc<Mutex<Option<Arc<str>>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the guard and register a new run (non-blocking)
    ///
    /// Fails with `AlreadyRunning` without creating anything if a run is active.
    pub fn try_start(&self, mode: Mode, dry_run: bool, steps: &[StepDef]) -> Result<Run> {
        let mut active = self.active.lock();
        if let Some(run_id) = active.as_ref() {
            return Err(HearthError::AlreadyRunning {
                active_run: run_id.to_string(),
            });
        }

        let run_id = self.fresh_id();
        let run = Run::new(Arc::clone(&run_id), mode, dry_run, steps);
        self.runs.insert(Arc::clone(&run_id), run.clone());
        *active = Some(run_id);
        Ok(run)
    }

    /// Mark the run complete and release the guard, atomically
    pub fn finish(&self, run_id: &str) {
        let mut active = self.active.lock();
        if let Some(mut run) = self.runs.get_mut(run_id) {
            run.status = RunStatus::Complete;
            run.completed_at = Some(Utc::now());
        }
        if active.as_deref() == Some(run_id) {
            *active = None;
        } else {
            warn!(run_id, "finish called for a run that does not hold the guard");
        }
    }

    /// Snapshot of a run
    pub fn get(&self, run_id: &str) -> Option<Run> {
        self.runs.get(run_id).map(|r| r.value().clone())
    }

    /// Snapshot of the run currently holding the guard
    pub fn active(&self) -> Option<Run> {
        let active = self.active.lock();
        active.as_deref().and_then(|id| self.get(id))
    }

    /// Replace one step status with an updated copy
    ///
    /// Updates that would move the step backwards are dropped.
    pub fn update_step<F>(&self, run_id: &str, index: usize, update: F)
    where
        F: FnOnce(&mut StepStatus),
    {
        let Some(mut run) = self.runs.get_mut(run_id) else {
            warn!(run_id, "update for unknown run");
            return;
        };
        let Some(current) = run.steps.get(index) else {
            warn!(run_id, index, "update for unknown step");
            return;
        };

        let mut next = current.clone();
        update(&mut next);
        if !current.status.can_transition_to(next.status) {
            warn!(
                run_id,
                index,
                from = ?current.status,
                to = ?next.status,
                "illegal step transition ignored"
            );
            return;
        }
        run.steps[index] = next;
    }

    /// Force every non-terminal step to `failed` (worker crashed)
    pub fn fail_unfinished(&self, run_id: &str, error: &str) {
        if let Some(mut run) = self.runs.get_mut(run_id) {
            for step in run.steps.iter_mut().filter(|s| !s.status.is_terminal()) {
                step.status = StepState::Failed;
                step.error = Some(error.to_string());
                step.message = None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn fresh_id(&self) -> Arc<str> {
        loop {
            let id = uuid::Uuid::new_v4().simple().to_string();
            let id: Arc<str> = Arc::from(&id[..RUN_ID_LEN]);
            if !self.runs.contains_key(&id) {
                return id;
            }
        }
    }
}

impl std::fmt::Debug for RunRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRegistry")
            .field("runs", &self.runs.len())
            .field("active", &*self.active.lock())
            .finish()
    }
}
