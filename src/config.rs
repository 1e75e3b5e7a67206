//! Configuration for Tally
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

/// Tally - profile compute pipeline for carbon-footprint datasets
#[derive(Parser, Debug, Clone)]
#[command(name = "tally")]
#[command(about = "Profile compute pipeline for carbon-footprint datasets")]
pub struct Args {
    /// Unique identifier for this pipeline session
    #[arg(long, env = "SESSION_ID", default_value_t = Uuid::new_v4())]
    pub session_id: Uuid,

    /// Live compute endpoint (POST {profile_id, overrides})
    #[arg(long, env = "COMPUTE_URL", default_value = "http://localhost:8090/api/compute")]
    pub compute_url: String,

    /// Health endpoint probed once at startup to pick live vs static mode.
    /// Defaults to the compute URL's /api/health sibling when unset.
    #[arg(long, env = "HEALTH_URL")]
    pub health_url: Option<String>,

    /// Base URL for static build artifacts (index.json, latest-build.json,
    /// manifest.json, figures, references)
    #[arg(long, env = "ARTIFACT_BASE", default_value = "http://localhost:8090/artifacts")]
    pub artifact_base: String,

    /// Profile the overrides apply to
    #[arg(long, env = "PROFILE_ID", default_value = "default")]
    pub profile_id: String,

    /// Comma-separated layers to scope the reference list to
    #[arg(long, env = "ACTIVE_LAYERS", default_value = "baseline")]
    pub active_layers: String,

    /// File holding the persisted control state
    #[arg(long, env = "STATE_PATH", default_value = "tally-controls.json")]
    pub state_path: PathBuf,

    /// Debounce window for coalescing rapid control changes
    #[arg(long, env = "DEBOUNCE_MS", default_value = "250")]
    pub debounce_ms: u64,

    /// Health probe timeout; expiry selects static mode
    #[arg(long, env = "PROBE_TIMEOUT_MS", default_value = "800")]
    pub probe_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Effective health URL (derived from the compute URL when unset)
    pub fn health_url(&self) -> String {
        if let Some(ref url) = self.health_url {
            return url.clone();
        }
        match self.compute_url.rfind("/api/") {
            Some(pos) => format!("{}/api/health", &self.compute_url[..pos]),
            None => format!("{}/health", self.compute_url.trim_end_matches('/')),
        }
    }

    /// Active layers as a list
    pub fn active_layer_list(&self) -> Vec<String> {
        self.active_layers
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.compute_url.is_empty() {
            return Err("COMPUTE_URL must not be empty".to_string());
        }
        if self.artifact_base.is_empty() {
            return Err("ARTIFACT_BASE must not be empty".to_string());
        }
        if self.probe_timeout_ms == 0 {
            return Err("PROBE_TIMEOUT_MS must be greater than zero".to_string());
        }
        Ok(())
    }
}
