//! Profile controls - user-adjustable lifestyle state
//!
//! The small set of sliders and choices a profile exposes: weekly
//! commute days, commute mode split, diet, and daily streaming hours.
//! All mutation goes through pure `with_*` operations that clamp their
//! input and keep the mode split summing to exactly 100.

use serde::{Deserialize, Serialize};

use crate::alloc::allocate_integer;

/// Commute days per week are capped at a full week.
pub const MAX_COMMUTE_DAYS: u8 = 7;

/// Streaming hours per day are capped at 6 (the slider's upper bound).
pub const MAX_STREAMING_HOURS: f64 = 6.0;

// ============================================================================
// Diet
// ============================================================================

/// Diet selection. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Diet {
    #[default]
    Omnivore,
    Vegetarian,
    Vegan,
}

impl Diet {
    /// All diets, in override-map order.
    pub const ALL: [Diet; 3] = [Diet::Omnivore, Diet::Vegetarian, Diet::Vegan];

    /// Override activity id for this diet.
    pub fn activity_id(&self) -> &'static str {
        match self {
            Diet::Omnivore => "diet.omnivore",
            Diet::Vegetarian => "diet.vegetarian",
            Diet::Vegan => "diet.vegan",
        }
    }

    /// Parse a diet id, returning `None` for unknown values so callers
    /// can keep their previous selection.
    pub fn parse(value: &str) -> Option<Diet> {
        match value.trim().to_ascii_lowercase().as_str() {
            "omnivore" => Some(Diet::Omnivore),
            "vegetarian" => Some(Diet::Vegetarian),
            "vegan" => Some(Diet::Vegan),
            _ => None,
        }
    }
}

// ============================================================================
// Mode split
// ============================================================================

/// Commute modes covered by the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommuteMode {
    Car,
    Transit,
    Bike,
}

impl CommuteMode {
    /// All modes, in split order.
    pub const ALL: [CommuteMode; 3] = [CommuteMode::Car, CommuteMode::Transit, CommuteMode::Bike];

    /// Override activity id for this mode's commute days.
    pub fn activity_id(&self) -> &'static str {
        match self {
            CommuteMode::Car => "commute.car_days",
            CommuteMode::Transit => "commute.transit_days",
            CommuteMode::Bike => "commute.bike_days",
        }
    }
}

/// Percentage split of commute days across modes. Always sums to 100
/// after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSplit {
    pub car: u8,
    pub transit: u8,
    pub bike: u8,
}

impl Default for ModeSplit {
    fn default() -> Self {
        Self {
            car: 60,
            transit: 30,
            bike: 10,
        }
    }
}

impl ModeSplit {
    /// Share for a single mode.
    pub fn share(&self, mode: CommuteMode) -> u8 {
        match mode {
            CommuteMode::Car => self.car,
            CommuteMode::Transit => self.transit,
            CommuteMode::Bike => self.bike,
        }
    }

    /// Sum of the three shares.
    pub fn total(&self) -> u16 {
        self.car as u16 + self.transit as u16 + self.bike as u16
    }

    /// Shares as allocation weights, in split order.
    pub fn weights(&self) -> [f64; 3] {
        [self.car as f64, self.transit as f64, self.bike as f64]
    }

    /// Rebalance the split so the three shares sum to exactly 100,
    /// preserving the current proportions. Idempotent: a split that
    /// already sums to 100 comes back unchanged.
    pub fn normalized(&self) -> ModeSplit {
        if self.total() == 100 {
            return *self;
        }
        let parts = allocate_integer(100, &self.weights());
        ModeSplit {
            car: parts[0] as u8,
            transit: parts[1] as u8,
            bike: parts[2] as u8,
        }
    }

    /// Pin one mode to `value` (clamped to [0,100]) and rebalance the
    /// other two proportionally to their current shares so the triple
    /// keeps summing to 100.
    pub fn with_share(&self, mode: CommuteMode, value: u8) -> ModeSplit {
        let pinned = value.min(100) as u32;
        let remaining = 100 - pinned;

        let (first, second) = match mode {
            CommuteMode::Car => (CommuteMode::Transit, CommuteMode::Bike),
            CommuteMode::Transit => (CommuteMode::Car, CommuteMode::Bike),
            CommuteMode::Bike => (CommuteMode::Car, CommuteMode::Transit),
        };
        let parts = allocate_integer(
            remaining,
            &[self.share(first) as f64, self.share(second) as f64],
        );

        let mut split = ModeSplit {
            car: 0,
            transit: 0,
            bike: 0,
        };
        split.set(mode, pinned as u8);
        split.set(first, parts[0] as u8);
        split.set(second, parts[1] as u8);
        split
    }

    fn set(&mut self, mode: CommuteMode, value: u8) {
        match mode {
            CommuteMode::Car => self.car = value,
            CommuteMode::Transit => self.transit = value,
            CommuteMode::Bike => self.bike = value,
        }
    }
}

// ============================================================================
// Profile controls
// ============================================================================

/// The full user-editable control state for one profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileControls {
    /// Commute days per week, 0-7.
    pub commute_days_per_week: u8,
    /// Percentage split of commute days across modes, sums to 100.
    pub mode_split: ModeSplit,
    /// Active diet.
    pub diet: Diet,
    /// Streaming hours per day, 0-6.
    pub streaming_hours_per_day: f64,
}

impl Default for ProfileControls {
    fn default() -> Self {
        Self {
            commute_days_per_week: 5,
            mode_split: ModeSplit::default(),
            diet: Diet::default(),
            streaming_hours_per_day: 2.0,
        }
    }
}

impl ProfileControls {
    /// Clamp every field into its valid range and rebalance the mode
    /// split to sum to 100. Idempotent.
    pub fn normalized(&self) -> ProfileControls {
        ProfileControls {
            commute_days_per_week: self.commute_days_per_week.min(MAX_COMMUTE_DAYS),
            mode_split: self.mode_split.normalized(),
            diet: self.diet,
            streaming_hours_per_day: self.streaming_hours_per_day.clamp(0.0, MAX_STREAMING_HOURS),
        }
    }

    /// Set the weekly commute days, clamped to [0,7].
    pub fn with_commute_days(&self, days: u8) -> ProfileControls {
        ProfileControls {
            commute_days_per_week: days.min(MAX_COMMUTE_DAYS),
            ..*self
        }
    }

    /// Pin one mode's share, rebalancing the other two.
    pub fn with_mode_split(&self, mode: CommuteMode, value: u8) -> ProfileControls {
        ProfileControls {
            mode_split: self.mode_split.with_share(mode, value),
            ..*self
        }
    }

    /// Select a diet.
    pub fn with_diet(&self, diet: Diet) -> ProfileControls {
        ProfileControls { diet, ..*self }
    }

    /// Set daily streaming hours, clamped to [0,6].
    pub fn with_streaming_hours(&self, hours: f64) -> ProfileControls {
        let clamped = if hours.is_finite() {
            hours.clamp(0.0, MAX_STREAMING_HOURS)
        } else {
            0.0
        };
        ProfileControls {
            streaming_hours_per_day: clamped,
            ..*self
        }
    }
}
