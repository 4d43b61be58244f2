//! # momentaryd: momentary switch daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Construct the file storage adapters and the tokio scheduler
//! - Run the legacy migration and load the switches
//! - Build the axum router, injecting application services
//! - Bind to a TCP port and serve
//! - Handle graceful shutdown (ctrl-c), cancelling pending reversions
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use momentary_adapter_http_axum::state::AppState;
use momentary_adapter_storage_file::{
    JsonIdentityRepository, YamlLegacySource, YamlSwitchConfigStore,
};
use momentary_adapter_timer_tokio::TokioScheduler;
use momentary_app::event_bus::InProcessEventBus;
use momentary_app::services::registry::SwitchRegistry;
use momentary_app::services::setup_service::SetupService;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config);

    // Runtime infrastructure
    let scheduler = Arc::new(TokioScheduler::current());
    let event_bus = Arc::new(InProcessEventBus::new(256));
    spawn_event_logger(&event_bus);
    tracing::debug!(listeners = event_bus.listeners(), "event bus ready");
    let registry = Arc::new(SwitchRegistry::new(scheduler, event_bus));

    // Storage
    let setup_service = Arc::new(SetupService::new(
        YamlSwitchConfigStore::new(&config.storage.switches_file),
        JsonIdentityRepository::new(&config.storage.identity_file),
        YamlLegacySource::new(&config.storage.legacy_file),
        Arc::clone(&registry),
    ));

    let report = setup_service.setup().await?;
    tracing::info!(
        migrated = report.migrated,
        switches = registry.len(),
        rejected = report.rejected,
        "momentary switches ready"
    );

    // HTTP
    let app = momentary_adapter_http_axum::router::build(AppState::from_arc(setup_service));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("momentaryd listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let cancelled = registry.clear();
    tracing::info!(cancelled, "momentaryd stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn spawn_event_logger(event_bus: &InProcessEventBus) {
    let mut events = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(
                    kind = ?event.kind,
                    entity_id = %event.entity_id,
                    is_on = event.is_on,
                    "switch event"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event logger lagging behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
