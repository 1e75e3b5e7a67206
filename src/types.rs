//! Shared error and result types

use thiserror::Error;

/// Error types for the compute pipeline
#[derive(Debug, Error)]
pub enum TallyError {
    /// Network transport failed (request rejected before a response)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Compute endpoint answered non-2xx; the body is surfaced verbatim
    #[error("{0}")]
    Compute(String),

    /// Artifact fetch failed after the resolver retry chain
    #[error("Artifact fetch failed for {path}: {message}")]
    Artifact { path: String, message: String },

    /// Artifact body did not parse
    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, TallyError>;
