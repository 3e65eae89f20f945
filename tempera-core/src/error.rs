//! # Error Types for Tempera
//!
//! Unified error handling across the core and lab crates.
//! Numeric degeneracies (zero coherence, empty text) are guarded locally
//! and never show up here.

use thiserror::Error;

/// Failure of a single generation request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// Transport-level failure (connection refused, timeout, TLS...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The backend answered but produced no text
    #[error("Empty response from generator")]
    EmptyResponse,

    /// Every retry attempt failed
    #[error("Generation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl GenerationError {
    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }
}

/// Main error type for Tempera operations
#[derive(Error, Debug)]
pub enum TemperaError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generator failure surfaced to the caller
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// A fitness function failed during an evolution generation
    #[error("Evaluation failed in generation {generation} (genome {genome}): {reason}")]
    Evaluation {
        generation: usize,
        genome: usize,
        reason: String,
    },

    /// Run storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type for Tempera operations
pub type TemperaResult<T> = Result<T, TemperaError>;

impl TemperaError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create an evaluation error
    pub fn evaluation(generation: usize, genome: usize, reason: impl Into<String>) -> Self {
        Self::Evaluation {
            generation,
            genome,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TemperaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
