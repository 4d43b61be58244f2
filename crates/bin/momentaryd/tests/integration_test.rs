//! End-to-end smoke tests for the full momentaryd stack.
//!
//! Each test spins up the complete application (files in a scratch
//! directory, real storage adapters, the tokio scheduler, real services and
//! the real axum router) and exercises the HTTP layer via
//! `tower::ServiceExt::oneshot`; no TCP port is bound.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use momentary_adapter_http_axum::router;
use momentary_adapter_http_axum::state::AppState;
use momentary_adapter_storage_file::{
    JsonIdentityRepository, YamlLegacySource, YamlSwitchConfigStore,
};
use momentary_adapter_timer_tokio::TokioScheduler;
use momentary_app::event_bus::InProcessEventBus;
use momentary_app::services::registry::SwitchRegistry;
use momentary_app::services::setup_service::{SetupReport, SetupService};
use serde_json::Value;
use tower::ServiceExt;

const LEGACY_CONFIGURATION: &str = "
homeassistant:
  name: Home

switch:
  - platform: momentary
    name: Empty House Trigger
    mode: old
    toggle_for: 5
    cancellable: true
  - platform: momentary
    name: '!Doorbell'
    on_for: {milliseconds: 100}
";

/// Scratch directory removed when the test ends.
struct Scratch(PathBuf);

impl Scratch {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("momentaryd-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }

    fn write(&self, name: &str, contents: &str) {
        std::fs::write(self.path(name), contents).unwrap();
    }

    fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).unwrap()
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Build a fully-wired router over the files in `dir` and run setup.
async fn app(dir: &Path) -> (axum::Router, SetupReport) {
    let registry = Arc::new(SwitchRegistry::new(
        Arc::new(TokioScheduler::current()),
        Arc::new(InProcessEventBus::new(256)),
    ));
    let setup_service = SetupService::new(
        YamlSwitchConfigStore::new(dir.join("momentary.yaml")),
        JsonIdentityRepository::new(dir.join(".storage").join("momentary.meta.json")),
        YamlLegacySource::new(dir.join("configuration.yaml")),
        registry,
    );
    let report = setup_service
        .setup()
        .await
        .expect("setup should succeed");
    (router::build(AppState::new(setup_service)), report)
}

async fn send(app: &axum::Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn switch_by_entity_id(app: &axum::Router, entity_id: &str) -> Value {
    let (_, body) = send(app, Method::GET, "/api/switches").await;
    body.as_array()
        .unwrap()
        .iter()
        .find(|switch| switch["entity_id"] == entity_id)
        .cloned()
        .unwrap_or_else(|| panic!("{entity_id} should be listed"))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let scratch = Scratch::new();
    let (app, _) = app(&scratch.0).await;

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_migrate_legacy_configuration_on_first_start() {
    let scratch = Scratch::new();
    scratch.write("configuration.yaml", LEGACY_CONFIGURATION);

    let (app, report) = app(&scratch.0).await;
    assert_eq!(report.migrated, 2);
    assert_eq!(report.created, 2);

    let switches = scratch.read("momentary.yaml");
    assert!(switches.contains("version: 1"));
    assert!(switches.contains("+Empty House Trigger"));
    assert!(switches.contains("name: Doorbell"));

    let meta: Value = serde_json::from_str(&scratch.read(".storage/momentary.meta.json")).unwrap();
    assert_eq!(meta["version"], 1);
    assert_eq!(
        meta["switches"]["+Empty House Trigger"]["unique_id"],
        "empty_house_trigger"
    );
    assert_eq!(meta["switches"]["Doorbell"]["entity_id"], "switch.doorbell");

    let trigger = switch_by_entity_id(&app, "switch.momentary_empty_house_trigger").await;
    assert_eq!(trigger["unique_id"], "empty_house_trigger");
    assert_eq!(trigger["is_on"], false);
}

#[tokio::test]
async fn should_leave_identity_store_untouched_on_second_start() {
    let scratch = Scratch::new();
    scratch.write("configuration.yaml", LEGACY_CONFIGURATION);

    app(&scratch.0).await;
    let first = scratch.read(".storage/momentary.meta.json");
    let switches = scratch.read("momentary.yaml");

    let (_, report) = app(&scratch.0).await;
    assert_eq!(report.migrated, 0);
    assert_eq!(report.created, 2);
    assert_eq!(scratch.read(".storage/momentary.meta.json"), first);
    assert_eq!(scratch.read("momentary.yaml"), switches);
}

// ---------------------------------------------------------------------------
// Reload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_replace_identity_when_switch_renamed() {
    let scratch = Scratch::new();
    scratch.write(
        "momentary.yaml",
        "version: 1\nswitches:\n- name: Garage Pulse\n  toggle_for: 2\n",
    );
    let (app, _) = app(&scratch.0).await;
    let old = switch_by_entity_id(&app, "switch.garage_pulse").await;
    let old_id = old["unique_id"].as_str().unwrap().to_string();
    assert!(old_id.ends_with(".momentary"));

    scratch.write(
        "momentary.yaml",
        "version: 1\nswitches:\n- name: Gate Pulse\n  toggle_for: 2\n",
    );
    let (status, report) = send(&app, Method::POST, "/api/reload").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["created"], 1);
    assert_eq!(report["removed"], 1);

    let (status, _) = send(&app, Method::GET, &format!("/api/switches/{old_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let meta = scratch.read(".storage/momentary.meta.json");
    assert!(!meta.contains("Garage Pulse"));
    assert!(meta.contains("Gate Pulse"));
}

#[tokio::test]
async fn should_load_valid_entries_when_one_is_malformed() {
    let scratch = Scratch::new();
    scratch.write(
        "momentary.yaml",
        "version: 1\nswitches:\n- name: Good\n- name: Bad\n  toggle_for: soon\n",
    );

    let (app, report) = app(&scratch.0).await;
    assert_eq!(report.rejected, 1);
    assert_eq!(report.created, 1);

    let (_, body) = send(&app, Method::GET, "/api/switches").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn should_keep_migrated_unique_id_when_entry_broken_then_fixed() {
    let scratch = Scratch::new();
    scratch.write("configuration.yaml", LEGACY_CONFIGURATION);
    let (app, _) = app(&scratch.0).await;
    let migrated = scratch.read(".storage/momentary.meta.json");
    let switches = scratch.read("momentary.yaml");

    scratch.write(
        "momentary.yaml",
        &switches.replace("toggle_for: 5", "toggle_for: 5s"),
    );
    let (status, report) = send(&app, Method::POST, "/api/reload").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["rejected"], 1);
    assert_eq!(report["orphaned_devices"], 0);
    assert_eq!(scratch.read(".storage/momentary.meta.json"), migrated);

    scratch.write("momentary.yaml", &switches);
    let (_, report) = send(&app, Method::POST, "/api/reload").await;
    assert_eq!(report["created"], 1);

    let trigger = switch_by_entity_id(&app, "switch.momentary_empty_house_trigger").await;
    assert_eq!(trigger["unique_id"], "empty_house_trigger");
    assert_eq!(scratch.read(".storage/momentary.meta.json"), migrated);
}

#[tokio::test]
async fn should_load_grouped_switches_onto_one_device() {
    let scratch = Scratch::new();
    scratch.write(
        "momentary.yaml",
        "version: 1\nswitches:\n- name: Gate\n- Hallway:\n  - name: Door\n  - name: +Bell\n",
    );
    let (app, report) = app(&scratch.0).await;
    assert_eq!(report.created, 3);

    let door = switch_by_entity_id(&app, "switch.door").await;
    let bell = switch_by_entity_id(&app, "switch.momentary_bell").await;
    let gate = switch_by_entity_id(&app, "switch.gate").await;
    assert_eq!(door["device_id"], bell["device_id"]);
    assert_ne!(door["device_id"], gate["device_id"]);

    let meta: Value = serde_json::from_str(&scratch.read(".storage/momentary.meta.json")).unwrap();
    assert_eq!(meta["devices"]["Hallway"]["device_id"], door["device_id"]);
}

// ---------------------------------------------------------------------------
// Timed behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_revert_to_idle_after_toggle_for() {
    let scratch = Scratch::new();
    scratch.write("configuration.yaml", LEGACY_CONFIGURATION);
    let (app, _) = app(&scratch.0).await;
    let doorbell = switch_by_entity_id(&app, "switch.doorbell").await;
    let uri = format!("/api/switches/{}", doorbell["unique_id"].as_str().unwrap());

    let (status, body) = send(&app, Method::POST, &format!("{uri}/turn_on")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_on"], true);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let (_, body) = send(&app, Method::GET, &uri).await;
    assert_eq!(body["is_on"], false);
}

#[tokio::test]
async fn should_cancel_immediately_when_cancellable() {
    let scratch = Scratch::new();
    scratch.write("configuration.yaml", LEGACY_CONFIGURATION);
    let (app, _) = app(&scratch.0).await;
    let trigger = switch_by_entity_id(&app, "switch.momentary_empty_house_trigger").await;
    let uri = format!("/api/switches/{}", trigger["unique_id"].as_str().unwrap());

    let (_, body) = send(&app, Method::POST, &format!("{uri}/toggle")).await;
    assert_eq!(body["is_on"], true);

    let (_, body) = send(&app, Method::POST, &format!("{uri}/turn_off")).await;
    assert_eq!(body["is_on"], false);
    assert!(body["toggle_until"].is_null());
}

#[tokio::test]
async fn should_reject_unknown_service() {
    let scratch = Scratch::new();
    scratch.write("configuration.yaml", LEGACY_CONFIGURATION);
    let (app, _) = app(&scratch.0).await;
    let doorbell = switch_by_entity_id(&app, "switch.doorbell").await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!(
            "/api/switches/{}/self_destruct",
            doorbell["unique_id"].as_str().unwrap()
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
