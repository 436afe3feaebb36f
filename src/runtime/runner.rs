//! Step Runner - sequential step execution with retries
//!
//! Steps run one at a time, actions within a step run one at a time. A step
//! attempt executes every action from the top even if some fail, collecting
//! errors; any error fails the attempt. Failed attempts are retried per the
//! retry policy, and a step that exhausts its retries is marked `failed`
//! without stopping later steps.

use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::ast::StepDef;
use crate::event::{EventKind, EventLog};
use crate::resilience::RetryPolicy;
use crate::store::{RunRegistry, StepState};

use super::invoker::ActionInvoker;
use super::verifier::{StateVerifier, Verification};

/// Background worker for one run at a time
#[derive(Clone, Debug)]
pub struct StepRunner {
    registry: RunRegistry,
    invoker: ActionInvoker,
    verifier: StateVerifier,
    retry: RetryPolicy,
}

impl StepRunner {
    pub fn new(
        registry: RunRegistry,
        invoker: ActionInvoker,
        verifier: StateVerifier,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            invoker,
            verifier,
            retry,
        }
    }

    /// Execute every step of a run in order
    ///
    /// Does not release the guard; the caller finishes the run.
    #[instrument(skip(self, steps, events), fields(step_count = steps.len()))]
    pub async fn run(&self, run_id: &str, steps: &[StepDef], dry_run: bool, events: &EventLog) {
        let start = Instant::now();
        let mut succeeded = 0;
        let mut failed = 0;

        for (index, step) in steps.iter().enumerate() {
            match self.run_step(run_id, index, step, dry_run, events).await {
                StepState::Success => succeeded += 1,
                _ => failed += 1,
            }
        }

        info!(succeeded, failed, "Run finished");
        events.emit(EventKind::RunCompleted {
            succeeded,
            failed,
            total_duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    /// Run one step through its retry loop, returning the terminal state
    #[instrument(skip(self, step, dry_run, events), fields(alias = %step.alias))]
    async fn run_step(
        &self,
        run_id: &str,
        index: usize,
        step: &StepDef,
        dry_run: bool,
        events: &EventLog,
    ) -> StepState {
        let start = Instant::now();
        let mut attempt = 1;

        loop {
            self.registry.update_step(run_id, index, |s| {
                s.status = StepState::Running;
                s.attempt = attempt;
            });
            events.emit(EventKind::StepStarted {
                step: index,
                alias: step.alias.clone(),
                attempt,
            });

            let errors = self.run_actions(run_id, index, step, dry_run, events).await;

            if errors.is_empty() {
                self.registry.update_step(run_id, index, |s| {
                    s.status = StepState::Success;
                    s.error = None;
                    s.message = None;
                });
                events.emit(EventKind::StepSucceeded {
                    step: index,
                    attempts: attempt,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
                return StepState::Success;
            }

            let error = errors.join("; ");

            if self.retry.should_retry(attempt) {
                let delay = self.retry.delay();
                warn!(attempt, %error, ?delay, "Step failed, retrying");
                self.registry.update_step(run_id, index, |s| {
                    s.status = StepState::Retrying;
                    s.error = Some(error.clone());
                    s.message = Some(format!(
                        "Retrying ({}/{})",
                        attempt + 1,
                        self.retry.max_attempts()
                    ));
                });
                events.emit(EventKind::StepRetrying {
                    step: index,
                    attempt,
                    error,
                });
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            warn!(attempt, %error, "Step failed, giving up");
            self.registry.update_step(run_id, index, |s| {
                s.status = StepState::Failed;
                s.error = Some(error.clone());
                s.message = None;
            });
            events.emit(EventKind::StepFailed {
                step: index,
                attempts: attempt,
                error,
            });
            return StepState::Failed;
        }
    }

    /// One attempt: invoke (and verify) every action, collecting errors
    async fn run_actions(
        &self,
        run_id: &str,
        index: usize,
        step: &StepDef,
        dry_run: bool,
        events: &EventLog,
    ) -> Vec<String> {
        let mut errors = Vec::new();

        for action in &step.actions {
            let message = action.progress_message();
            self.registry
                .update_step(run_id, index, |s| s.message = Some(message));

            match self.invoker.invoke(action, dry_run).await {
                Ok(body) => {
                    events.emit(EventKind::ActionInvoked {
                        step: index,
                        service: action.service.to_string(),
                        body,
                        dry_run,
                    });

                    if !dry_run {
                        match self.verifier.verify(action).await {
                            Ok(Verification::Passed(entities)) => {
                                events.emit(EventKind::VerificationPassed {
                                    step: index,
                                    entities,
                                });
                            }
                            Ok(Verification::Skipped) => {}
                            Err(e) => {
                                events.emit(EventKind::VerificationFailed {
                                    step: index,
                                    error: e.to_string(),
                                });
                                errors.push(format!("{}: {}", action.label(), e));
                            }
                        }
                    }
                }
                Err(e) => {
                    events.emit(EventKind::ActionFailed {
                        step: index,
                        service: action.service.to_string(),
                        error: e.to_string(),
                    });
                    errors.push(format!("{}: {}", action.label(), e));
                }
            }

            if let Some(delay) = action.post_delay() {
                tokio::time::sleep(delay).await;
            }
        }

        errors
    }
}
