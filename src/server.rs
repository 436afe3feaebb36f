//! HTTP control surface
//!
//! Thin axum layer over [`Engine`]: every handler delegates and maps
//! `HearthError` to a status code plus `{code, message}` body.

use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::ast::Mode;
use crate::error::HearthError;
use crate::event::Event;
use crate::runtime::Engine;
use crate::store::Run;

#[derive(Clone)]
struct AppState {
    engine: Engine,
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    mode: String,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    run_id: String,
}

#[derive(Debug, Serialize)]
struct StepPreview {
    alias: String,
    icon: String,
    actions: usize,
}

#[derive(Debug, Serialize)]
struct AwayModeResponse {
    away: bool,
    suggested_mode: Mode,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorBody>)>;

/// Build the router (exposed for in-process tests)
pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/runs", post(start_run))
        .route("/api/runs/active", get(active_run))
        .route("/api/runs/{run_id}", get(run_status))
        .route("/api/runs/{run_id}/events", get(run_events))
        .route("/api/modes/{mode}/steps", get(mode_steps))
        .route("/api/away-mode", get(away_mode))
        .with_state(AppState { engine })
}

pub async fn serve(engine: Engine, listen: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .context("bind server listener failed")?;
    info!(%listen, "hearth listening");
    axum::serve(listener, router(engine))
        .await
        .context("server terminated with error")
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn start_run(
    State(state): State<AppState>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload.map_err(|rejection| {
        map_error(HearthError::InvalidRequest {
            details: rejection.body_text(),
        })
    })?;
    let run_id = state
        .engine
        .start_execution_named(&payload.mode, payload.dry_run)
        .map_err(map_error)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            run_id: run_id.to_string(),
        }),
    ))
}

async fn active_run(State(state): State<AppState>) -> Json<Option<Run>> {
    Json(state.engine.get_active_run())
}

async fn run_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<Run>> {
    state
        .engine
        .get_run_status(&run_id)
        .map(Json)
        .ok_or_else(|| map_error(HearthError::RunNotFound { run_id }))
}

async fn run_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<Vec<Event>>> {
    state
        .engine
        .get_run_events(&run_id)
        .map(Json)
        .map_err(map_error)
}

async fn mode_steps(
    State(state): State<AppState>,
    Path(mode): Path<String>,
) -> ApiResult<Json<Vec<StepPreview>>> {
    let mode: Mode = mode.parse().map_err(map_error)?;
    let steps = state
        .engine
        .catalog()
        .steps(mode)
        .iter()
        .map(|step| StepPreview {
            alias: step.alias.clone(),
            icon: step.icon.clone(),
            actions: step.actions.len(),
        })
        .collect();
    Ok(Json(steps))
}

async fn away_mode(State(state): State<AppState>) -> Json<AwayModeResponse> {
    let (away, suggested_mode) = state.engine.suggested_mode().await;
    Json(AwayModeResponse {
        away,
        suggested_mode,
    })
}

fn map_error(err: HearthError) -> (StatusCode, Json<ErrorBody>) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorBody {
            code: err.code().to_string(),
            message: err.to_string(),
        }),
    )
}
