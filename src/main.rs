//! Tally - profile compute pipeline for carbon-footprint datasets

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use footprint_core::{derive_overrides, reconcile_references};
use tally::{
    artifacts::{ArtifactStore, HttpArtifactFetcher, StaticAssembler},
    config::Args,
    scheduler::{ComputePhase, ComputeScheduler},
    store::ControlsStore,
    transport::{ComputeRequest, HttpTransport, HttpTransportConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tally={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Tally - Profile Compute Pipeline");
    info!("======================================");
    info!("Session: {}", args.session_id);
    info!("Profile: {}", args.profile_id);
    info!("Compute: {}", args.compute_url);
    info!("Health: {}", args.health_url());
    info!("Artifacts: {}", args.artifact_base);
    info!("Layers: {}", args.active_layers);
    info!("State: {}", args.state_path.display());
    info!("Debounce: {}ms", args.debounce_ms);
    info!("======================================");

    // Restore persisted controls and derive the override map
    let store = ControlsStore::load(&args.state_path);
    let controls = store.get();
    let overrides = derive_overrides(&controls);
    info!(
        commute_days = controls.commute_days_per_week,
        diet = controls.diet.activity_id(),
        streaming_hours = controls.streaming_hours_per_day,
        overrides = overrides.len(),
        "Controls loaded"
    );

    // Wire the transport, artifact store, and scheduler
    let transport = Arc::new(HttpTransport::new(HttpTransportConfig {
        compute_url: args.compute_url.clone(),
        health_url: args.health_url(),
        probe_timeout: Duration::from_millis(args.probe_timeout_ms),
    }));
    let artifacts = Arc::new(ArtifactStore::new(Arc::new(HttpArtifactFetcher::new(
        args.artifact_base.clone(),
    ))));
    let assembler = Arc::new(StaticAssembler::new(artifacts.clone()));
    let scheduler = ComputeScheduler::new(
        transport,
        assembler,
        Duration::from_millis(args.debounce_ms),
    );

    // Probe once to settle live vs static, then dispatch the restored
    // control state
    scheduler.init().await;
    scheduler
        .dispatch(ComputeRequest {
            profile_id: args.profile_id.clone(),
            overrides,
        })
        .await;
    let snapshot = scheduler.settled().await;

    match (snapshot.phase, snapshot.result.as_ref()) {
        (ComputePhase::Success, Some(result)) => {
            let references = reconcile_references(&args.active_layer_list(), result);
            let summary = serde_json::json!({
                "session_id": args.session_id,
                "mode": snapshot.mode,
                "dataset_id": result.dataset_id,
                "figures": result.figures.keys().collect::<Vec<_>>(),
                "references": references,
                "scheduler": scheduler.stats(),
                "artifacts": artifacts.stats(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            warn!(error = ?snapshot.error, "Compute pipeline did not produce a result");
            std::process::exit(1);
        }
    }

    Ok(())
}
