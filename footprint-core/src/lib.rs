//! Footprint Core - Pure profile-control derivation
//!
//! Synchronous, I/O-free building blocks for the tally compute pipeline:
//!
//! - **Allocation**: largest-remainder apportionment used to keep mode
//!   splits summing to exactly 100 and commute day-equivalents summing
//!   to exactly the weekly commute days
//! - **Controls**: user-adjustable lifestyle state with clamping and
//!   normalization
//! - **Overrides**: mapping from controls to the flat numeric override
//!   map sent to the compute backend
//! - **Manifest**: serde model of dataset/figure manifests and compute
//!   results, tolerant of unknown fields (artifacts are versioned
//!   independently of this client)
//! - **References**: permissive reference-list parsing and layer-scoped
//!   reconciliation into a single numbered list
//!
//! Everything here is a total function over validated input; the async
//! scheduling, fetching and persistence live in the `tally` crate.

pub mod alloc;
pub mod controls;
pub mod manifest;
pub mod overrides;
pub mod references;

pub use alloc::{allocate_fractional, allocate_integer, round3};
pub use controls::{CommuteMode, Diet, ModeSplit, ProfileControls};
pub use manifest::{
    ComputeResult, DatasetManifest, FigureManifest, ManifestPointer, ReferenceEntry,
    ReferenceOrderEntry,
};
pub use overrides::{derive_overrides, OverrideMap};
pub use references::{parse_reference_list, reconcile_references};
