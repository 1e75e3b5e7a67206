//! Override derivation - controls to compute parameters
//!
//! Maps a `ProfileControls` snapshot to the flat activity-id → value
//! map posted to the compute backend. Derivation is recomputed from
//! scratch on every control change; the map is never mutated in place.
//!
//! Invariants:
//! - the three commute-day overrides sum to exactly
//!   `commute_days_per_week` at 3 decimals (residual folded into the
//!   last mode)
//! - exactly one diet override is 7 (days per week); the rest are 0
//! - the streaming override is hours/day × 7, rounded to 3 decimals

use std::collections::BTreeMap;

use crate::alloc::{allocate_fractional, round3};
use crate::controls::{CommuteMode, Diet, ProfileControls};

/// Activity id for weekly streaming hours.
pub const STREAMING_ACTIVITY_ID: &str = "streaming.hours_per_week";

/// Days per week credited to the selected diet.
pub const DIET_DAYS_PER_WEEK: f64 = 7.0;

/// Flat map of activity id → numeric override. BTreeMap keeps the
/// serialized request body deterministic.
pub type OverrideMap = BTreeMap<String, f64>;

/// Derive the override map for a control snapshot.
///
/// The controls are normalized first, so the derivation is total over
/// any input the store can hold.
pub fn derive_overrides(controls: &ProfileControls) -> OverrideMap {
    let controls = controls.normalized();
    let mut overrides = OverrideMap::new();

    let days = allocate_fractional(
        controls.commute_days_per_week as f64,
        &controls.mode_split.weights(),
    );
    for (mode, value) in CommuteMode::ALL.iter().zip(days) {
        overrides.insert(mode.activity_id().to_string(), value);
    }

    for diet in Diet::ALL {
        let value = if diet == controls.diet {
            DIET_DAYS_PER_WEEK
        } else {
            0.0
        };
        overrides.insert(diet.activity_id().to_string(), value);
    }

    overrides.insert(
        STREAMING_ACTIVITY_ID.to_string(),
        round3(controls.streaming_hours_per_day * 7.0),
    );

    overrides
}
