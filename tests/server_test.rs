//! HTTP control surface tests (real listener, reqwest client)

use std::sync::Arc;

use hearth::config::EngineSettings;
use hearth::{ActionDef, Engine, EntityState, MockApi, StepCatalog, StepDef};
use serde_json::{json, Value};

const AWAY: &str = "input_boolean.away_mode";

fn catalog() -> StepCatalog {
    let turn_off = ActionDef::new("switch/turn_off".parse().unwrap()).with_entity("switch.a");
    StepCatalog {
        vacation_steps: vec![StepDef::new("Switches off", vec![turn_off])],
        home_steps: vec![],
    }
}

/// Start the router on an ephemeral port, returning its base URL
async fn spawn_server(api: MockApi, dry_run_delay_ms: u64) -> String {
    let settings = EngineSettings {
        dry_run_delay_ms,
        ..EngineSettings::default()
    };
    let engine = Engine::new(catalog(), Arc::new(api), &settings, AWAY);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, hearth::server::router(engine))
            .await
            .unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health() {
    let base = spawn_server(MockApi::new(), 0).await;
    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_start_conflict_and_status() {
    // long dry-run delay keeps the first run active
    let base = spawn_server(MockApi::new(), 2_000).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{base}/api/runs"))
        .json(&json!({"mode": "vacation", "dry_run": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    let run_id = resp.json::<Value>().await.unwrap()["run_id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = http
        .post(format!("{base}/api/runs"))
        .json(&json!({"mode": "home"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "HEARTH-022");

    let run: Value = http
        .get(format!("{base}/api/runs/{run_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(run["run_id"], run_id.as_str());
    assert_eq!(run["mode"], "vacation");
    assert_eq!(run["status"], "running");
    assert_eq!(run["steps"][0]["alias"], "Switches off");

    let active: Value = http
        .get(format!("{base}/api/runs/active"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active["run_id"], run_id.as_str());

    let events: Value = http
        .get(format!("{base}/api/runs/{run_id}/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(events[0]["kind"]["type"], "run_started");
}

#[tokio::test]
async fn test_invalid_mode_and_unknown_run() {
    let base = spawn_server(MockApi::new(), 0).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{base}/api/runs"))
        .json(&json!({"mode": "weekend"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = http
        .get(format!("{base}/api/runs/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = http
        .get(format!("{base}/api/runs/missing/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let active: Value = http
        .get(format!("{base}/api/runs/active"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(active.is_null());
}

#[tokio::test]
async fn test_malformed_start_body_uses_error_body() {
    let base = spawn_server(MockApi::new(), 0).await;
    let http = reqwest::Client::new();

    // not JSON at all
    let resp = http
        .post(format!("{base}/api/runs"))
        .header("content-type", "application/json")
        .body("{mode: vacation")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "HEARTH-023");
    assert!(body["message"].as_str().unwrap().contains("Invalid request body"));

    // well-formed JSON missing `mode`
    let resp = http
        .post(format!("{base}/api/runs"))
        .json(&json!({"dry_run": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "HEARTH-023");

    // no content type
    let resp = http
        .post(format!("{base}/api/runs"))
        .body(r#"{"mode": "home"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "HEARTH-023");

    let active: Value = http
        .get(format!("{base}/api/runs/active"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(active.is_null());
}

#[tokio::test]
async fn test_steps_preview_and_away_mode() {
    let api = MockApi::new();
    api.set_state(EntityState::new(AWAY, "on"));
    let base = spawn_server(api, 0).await;

    let steps: Value = reqwest::get(format!("{base}/api/modes/vacation/steps"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        steps,
        json!([{"alias": "Switches off", "icon": "mdi:cog", "actions": 1}])
    );

    let away: Value = reqwest::get(format!("{base}/api/away-mode"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(away, json!({"away": true, "suggested_mode": "home"}));
}

#[tokio::test]
async fn test_away_read_failure_is_not_away() {
    let base = spawn_server(MockApi::new(), 0).await;
    let away: Value = reqwest::get(format!("{base}/api/away-mode"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(away, json!({"away": false, "suggested_mode": "vacation"}));
}
