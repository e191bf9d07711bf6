//! Error types for the pipeline actors.

use lorenz_env::{QueueError, ShapeError, StoreError, TransportError};
use thiserror::Error;

/// The update rule produced something unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericalError {
    /// NaN or infinity in the updated state (divergence)
    #[error("Non-finite value in component {component}")]
    NonFinite { component: usize },

    /// The vector field is not defined for this state size
    #[error("Field '{field}' is not defined for dimension {dimension}")]
    DimensionMismatch { field: &'static str, dimension: usize },
}

/// A received frame does not match the expected layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("Frame number {0} is not a non-negative integer")]
    FrameNumber(String),
}

/// Checkpoint file could not be written or read back.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Checkpoint holds no rows")]
    Empty,
}

/// Anything that can abandon a single `run_step`.
///
/// Never escapes `Actor::run_step`; the actor logs it and carries on.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Queue failure: {0}")]
    Queue(#[from] QueueError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Numerical failure: {0}")]
    Numerical(#[from] NumericalError),

    #[error("Shape failure: {0}")]
    Shape(#[from] ShapeError),
}

/// Failures while acquiring an actor's resources. These abort startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Cannot bind output channel: {0}")]
    Transport(#[from] TransportError),

    #[error("Cannot load seed: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
