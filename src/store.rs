//! Controls store - durable user-editable state
//!
//! Holds the current `ProfileControls`, exposes clamping setters that
//! no-op on unchanged values (so downstream recomputation is skipped),
//! and persists every committed change to a single JSON document.
//!
//! Persistence is best-effort: a failed write is logged and the store
//! keeps operating in memory. Missing or corrupted state silently
//! resets to defaults; neither path ever surfaces to the caller.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use footprint_core::{CommuteMode, Diet, ProfileControls};

/// Envelope version for the persisted document.
const STATE_VERSION: u32 = 1;

/// Persisted control state with its envelope.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedControls {
    version: u32,
    saved_at: DateTime<Utc>,
    controls: ProfileControls,
}

/// Store for the user-editable profile controls.
pub struct ControlsStore {
    state_path: Option<PathBuf>,
    current: RwLock<ProfileControls>,
}

impl ControlsStore {
    /// Create a store backed by `state_path`, restoring any persisted
    /// state. Corrupted or missing state resets to defaults.
    pub fn load(state_path: impl AsRef<Path>) -> Self {
        let path = state_path.as_ref().to_path_buf();
        let controls = restore(&path).unwrap_or_default();
        Self {
            state_path: Some(path),
            current: RwLock::new(controls.normalized()),
        }
    }

    /// Create an in-memory store (tests, ephemeral sessions).
    pub fn in_memory() -> Self {
        Self {
            state_path: None,
            current: RwLock::new(ProfileControls::default()),
        }
    }

    /// Current control state.
    pub fn get(&self) -> ProfileControls {
        self.current.read().map(|c| *c).unwrap_or_default()
    }

    /// Set the weekly commute days. Returns whether the state changed.
    pub fn set_commute_days(&self, days: u8) -> bool {
        self.commit(self.get().with_commute_days(days))
    }

    /// Pin one commute mode's share, rebalancing the other two.
    pub fn set_mode_split(&self, mode: CommuteMode, value: u8) -> bool {
        self.commit(self.get().with_mode_split(mode, value))
    }

    /// Select a diet by id. Unknown ids keep the previous selection.
    pub fn set_diet(&self, diet_id: &str) -> bool {
        match Diet::parse(diet_id) {
            Some(diet) => self.commit(self.get().with_diet(diet)),
            None => {
                debug!(diet = diet_id, "Ignoring unknown diet id");
                false
            }
        }
    }

    /// Set daily streaming hours.
    pub fn set_streaming_hours(&self, hours: f64) -> bool {
        self.commit(self.get().with_streaming_hours(hours))
    }

    /// Replace the whole control state (normalized first).
    pub fn set_controls(&self, next: ProfileControls) -> bool {
        self.commit(next.normalized())
    }

    /// Commit a candidate state: no-op when unchanged, otherwise store
    /// and persist best-effort.
    fn commit(&self, next: ProfileControls) -> bool {
        match self.current.write() {
            Ok(mut current) => {
                if *current == next {
                    return false;
                }
                *current = next;
            }
            Err(_) => return false,
        }
        self.persist(&next);
        true
    }

    fn persist(&self, controls: &ProfileControls) {
        let Some(ref path) = self.state_path else {
            return;
        };
        let document = PersistedControls {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            controls: *controls,
        };
        let body = match serde_json::to_string_pretty(&document) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize control state");
                return;
            }
        };
        if let Err(e) = std::fs::write(path, body) {
            warn!(path = %path.display(), error = %e, "Failed to persist control state");
        }
    }
}

/// Restore controls from disk. Any failure resets to defaults.
fn restore(path: &Path) -> Option<ProfileControls> {
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(_) => {
            debug!(path = %path.display(), "No persisted control state, using defaults");
            return None;
        }
    };
    match serde_json::from_str::<PersistedControls>(&body) {
        Ok(document) if document.version == STATE_VERSION => {
            info!(path = %path.display(), saved_at = %document.saved_at, "Restored control state");
            Some(document.controls)
        }
        Ok(document) => {
            warn!(version = document.version, "Unknown control state version, resetting to defaults");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupted control state, resetting to defaults");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_report_change() {
        let store = ControlsStore::in_memory();
        assert!(store.set_commute_days(3));
        assert!(!store.set_commute_days(3));
        assert_eq!(store.get().commute_days_per_week, 3);
    }

    #[test]
    fn clamped_setter_can_be_a_noop() {
        let store = ControlsStore::in_memory();
        let days = store.get().commute_days_per_week;
        // Out-of-range input clamps to 7; setting it twice is one change.
        assert!(store.set_commute_days(99));
        assert!(!store.set_commute_days(200));
        assert_eq!(store.get().commute_days_per_week, 7);
        assert_ne!(days, 7);
    }

    #[test]
    fn unknown_diet_keeps_previous_value() {
        let store = ControlsStore::in_memory();
        assert!(store.set_diet("vegan"));
        assert!(!store.set_diet("fruitarian"));
        assert_eq!(store.get().diet, Diet::Vegan);
    }

    #[test]
    fn mode_split_stays_normalized() {
        let store = ControlsStore::in_memory();
        assert!(store.set_mode_split(CommuteMode::Bike, 80));
        assert_eq!(store.get().mode_split.total(), 100);
        assert_eq!(store.get().mode_split.bike, 80);
    }

    #[test]
    fn persists_and_restores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controls.json");
        {
            let store = ControlsStore::load(&path);
            store.set_commute_days(2);
            store.set_diet("vegetarian");
        }
        let store = ControlsStore::load(&path);
        assert_eq!(store.get().commute_days_per_week, 2);
        assert_eq!(store.get().diet, Diet::Vegetarian);
    }

    #[test]
    fn corrupted_state_resets_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controls.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = ControlsStore::load(&path);
        assert_eq!(store.get(), ProfileControls::default());
    }

    #[test]
    fn unwritable_path_still_operates_in_memory() {
        let store = ControlsStore::load("/nonexistent-dir/controls.json");
        assert!(store.set_commute_days(1));
        assert_eq!(store.get().commute_days_per_week, 1);
    }
}
