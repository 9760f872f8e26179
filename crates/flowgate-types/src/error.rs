//! Error types for FlowGate
//!
//! Defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for FlowGate operations
#[derive(Error, Debug)]
pub enum Error {
    /// Gate not found
    #[error("Gate not found: {0}")]
    GateNotFound(String),

    /// Gate already exists
    #[error("Gate already exists: {0}")]
    GateAlreadyExists(String),

    /// Gate task is no longer running
    #[error("Gate stopped: {0}")]
    GateStopped(String),

    /// Mode value outside open/closed/queueing
    #[error("Invalid state: {0}")]
    InvalidMode(String),

    /// Two commands share the same control token
    #[error("Duplicate command token: {token}")]
    DuplicateCommand { token: String },

    /// Invalid gate configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Queue reached its configured bound
    #[error("Queue is full ({0} messages)")]
    QueueFull(usize),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for FlowGate operations
pub type Result<T> = std::result::Result<T, Error>;
