//! Tally - profile compute pipeline for carbon-footprint datasets
//!
//! Connects user-editable profile controls to the compute backend:
//! control changes become activity overrides, overrides are dispatched
//! through a debounced scheduler with live/static fallback, and the
//! committed results are reconciled into a layer-scoped reference list.
//!
//! The pure data model (controls, allocation, manifests, references)
//! lives in the `footprint-core` crate; this crate adds the I/O:
//! persistence, transport, artifact resolution, and scheduling.

pub mod artifacts;
pub mod config;
pub mod scheduler;
pub mod store;
pub mod transport;
pub mod types;

pub use config::Args;
pub use types::{Result, TallyError};
