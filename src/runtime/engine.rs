//! Engine - process-wide execution service
//!
//! Constructed once at startup and shared (cheap clone) with request handlers.
//! `start_execution` returns as soon as the run is registered; the steps run
//! on a spawned tokio task that releases the single-flight guard when done.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, info, instrument, warn};

use crate::ast::{Mode, StepCatalog};
use crate::config::{EngineSettings, HearthConfig};
use crate::error::{HearthError, Result};
use crate::event::{Event, EventKind};
use crate::hass::{AutomationApi, HassClient};
use crate::store::{Run, RunRegistry};

use super::invoker::ActionInvoker;
use super::runner::StepRunner;
use super::verifier::StateVerifier;

#[derive(Clone)]
pub struct Engine {
    registry: RunRegistry,
    catalog: Arc<StepCatalog>,
    api: Arc<dyn AutomationApi>,
    runner: StepRunner,
    away_mode_entity: Arc<str>,
}

impl Engine {
    pub fn new(
        catalog: StepCatalog,
        api: Arc<dyn AutomationApi>,
        settings: &EngineSettings,
        away_mode_entity: &str,
    ) -> Self {
        let registry = RunRegistry::new();
        let runner = StepRunner::new(
            registry.clone(),
            ActionInvoker::new(Arc::clone(&api), settings.dry_run_delay()),
            StateVerifier::new(
                Arc::clone(&api),
                settings.verify_interval(),
                settings.verify_timeout(),
                settings.numeric_tolerance,
            ),
            settings.retry_policy(),
        );

        Self {
            registry,
            catalog: Arc::new(catalog),
            api,
            runner,
            away_mode_entity: away_mode_entity.into(),
        }
    }

    /// Build from config: load the catalog and connect to Home Assistant
    pub fn from_config(config: &HearthConfig) -> Result<Self> {
        config.engine.validate()?;
        let catalog = StepCatalog::load(&config.catalog_path())?;
        let client = HassClient::new(config.hass_url()?, config.hass_token()?)?;
        Ok(Self::new(
            catalog,
            Arc::new(client),
            &config.engine,
            &config.hass.away_mode_entity,
        ))
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    /// Start a run of `mode` in the background and return its id
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self))]
    pub fn start_execution(&self, mode: Mode, dry_run: bool) -> Result<Arc<str>> {
        let steps = self.catalog.steps(mode).to_vec();
        let run = self.registry.try_start(mode, dry_run, &steps)?;
        let run_id = Arc::clone(&run.run_id);

        info!(run_id = %run_id, steps = steps.len(), "Run started");
        run.events.emit(EventKind::RunStarted {
            run_id: Arc::clone(&run_id),
            mode,
            dry_run,
            step_count: steps.len(),
        });

        let runner = self.runner.clone();
        let registry = self.registry.clone();
        let events = run.events.clone();
        let worker_id = Arc::clone(&run_id);

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(runner.run(&worker_id, &steps, dry_run, &events))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                error!(run_id = %worker_id, "Step runner panicked");
                registry.fail_unfinished(&worker_id, "internal error: step runner crashed");
            }
            registry.finish(&worker_id);
        });

        Ok(run_id)
    }

    /// Same as `start_execution` with a mode name (400-style error on bad input)
    pub fn start_execution_named(&self, mode: &str, dry_run: bool) -> Result<Arc<str>> {
        self.start_execution(mode.parse()?, dry_run)
    }

    pub fn get_run_status(&self, run_id: &str) -> Option<Run> {
        self.registry.get(run_id)
    }

    pub fn get_active_run(&self) -> Option<Run> {
        self.registry.active()
    }

    pub fn get_run_events(&self, run_id: &str) -> Result<Vec<Event>> {
        self.registry
            .get(run_id)
            .map(|run| run.events.events())
            .ok_or_else(|| HearthError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    /// Probe the away-mode entity (`on` = house empty)
    pub async fn get_away_mode_state(&self) -> Result<bool> {
        let state = self.api.get_state(&self.away_mode_entity).await?;
        Ok(state.is_on())
    }

    /// Mode to preselect in the UI; a failed away-mode read counts as not away
    pub async fn suggested_mode(&self) -> (bool, Mode) {
        let away = match self.get_away_mode_state().await {
            Ok(away) => away,
            Err(e) => {
                warn!(error = %e, "Away-mode read failed, assuming not away");
                false
            }
        };
        (away, Mode::suggested(away))
    }

    /// Poll a run until it completes
    pub async fn wait_for(&self, run_id: &str, poll: Duration) -> Option<Run> {
        loop {
            let run = self.registry.get(run_id)?;
            if !run.is_running() {
                return Some(run);
            }
            tokio::time::sleep(poll).await;
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("away_mode_entity", &self.away_mode_entity)
            .finish_non_exhaustive()
    }
}
