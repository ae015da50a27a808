//! Error types for the simulation.
//!
//! The tick loop itself never fails; these errors cover API misuse
//! (unknown ids, wrong control mode) and map decoding.

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Invalid resource node reference.
    #[error("Resource node not found: {0}")]
    ResourceNotFound(u32),

    /// A spawn was requested but the world has no cell to place it on.
    #[error("No spawn cell available: {0}")]
    NoSpawnCell(String),

    /// Input was sent to an entity that is not under manual control.
    #[error("Entity {0} is not under manual control")]
    NotManuallyControlled(EntityId),

    /// Map definition could not be decoded.
    #[error("Invalid map definition: {0}")]
    InvalidMap(String),

    /// Invalid simulation state.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}
