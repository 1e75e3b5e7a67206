//! Artifact module - static build output access
//!
//! Static builds of the dataset are content-addressed: every figure,
//! manifest and reference export lives under a hashed build directory.
//! This module resolves logical artifact paths to the best physical
//! candidate, caches everything fetched for the session, and can
//! reassemble a full compute result from the static artifacts when the
//! live endpoint is unavailable.

pub mod assemble;
pub mod fetch;
pub mod resolver;

pub use assemble::StaticAssembler;
pub use fetch::{ArtifactFetcher, HttpArtifactFetcher};
pub use resolver::{ArtifactStore, ArtifactStoreStats, MARKER_DIR};
