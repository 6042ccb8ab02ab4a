//! Error types for the prefetch engine.

use thiserror::Error;

use crate::coord::TileCoord;

/// Errors surfaced by host capability implementations while the planner or
/// loader resolves tile grids and tile handles.
///
/// These never propagate out of a planning or dispatch pass; the candidate
/// that raised one is skipped and the pass continues.
#[derive(Debug, Error)]
pub enum HostError {
    /// The layer has no tile source attached.
    #[error("layer has no tile source")]
    NoSource,

    /// No tile grid is available for the active projection.
    #[error("no tile grid for the active projection")]
    NoGrid,

    /// The requested tile coordinate is outside the grid.
    #[error("tile coordinate out of range: {0}")]
    OutOfRange(TileCoord),

    /// Any other host-side resolution failure.
    #[error("{0}")]
    Other(String),
}

/// Errors raised when constructing a manager from an invalid configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The spatial buffer factor must be at least 1.0.
    #[error("spatial buffer factor must be >= 1.0, got {0}")]
    InvalidBufferFactor(f64),

    /// At least one concurrent load slot is required.
    #[error("max concurrent loads must be >= 1")]
    ZeroConcurrency,
}
