//! Error types for the simulation engine and the study driver.

use thiserror::Error;

/// Failures raised while evaluating a motor configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A dimensional or operating-point field failed validation.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The equilibrium solver produced an unusable combustion state.
    #[error("thermochemistry failure: {0}")]
    Thermochemistry(String),

    /// An oxidizer property query fell outside the correlation's range.
    #[error("fluid property failure: {0}")]
    FluidProperty(String),
}

/// Failures raised by the study registry and its durable store.
#[derive(Debug, Error)]
pub enum StudyError {
    /// The optimization configuration is malformed.
    #[error("invalid study configuration: {0}")]
    InvalidConfig(String),

    /// The study id exists neither in memory nor in the store.
    #[error("study not found: {0}")]
    NotFound(String),

    /// Reading or writing the study directory failed.
    #[error("study persistence failure: {0}")]
    Persistence(#[from] std::io::Error),

    /// A persisted study record could not be encoded or decoded.
    #[error("study record failure: {0}")]
    Record(#[from] serde_json::Error),
}
