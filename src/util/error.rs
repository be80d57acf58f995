//! Error types for the ray tracer core.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for BVH building, scene upload and frame orchestration.
#[derive(Error, Debug)]
pub enum Error {
    /// A fixed-capacity GPU array would overflow
    #[error("{what} count {count} exceeds capacity {capacity}")]
    CapacityExceeded {
        what: &'static str,
        count: usize,
        capacity: usize,
    },

    /// Flattened tree violates a structural invariant
    #[error("Invalid BVH: {0}")]
    InvalidTree(String),

    /// Acquire or present returned a non-recoverable status
    #[error("{operation} failed with status code {code}")]
    Presentation { operation: &'static str, code: i32 },

    /// Queue submission failed
    #[error("Queue submission failed: {0}")]
    Submit(String),

    /// Semaphore or fence creation/wait failed
    #[error("Synchronization object error: {0}")]
    SyncObject(String),

    /// Frame protocol call made in the wrong state
    #[error("Frame protocol violation: expected {expected}, frame is {actual}")]
    FrameState {
        expected: &'static str,
        actual: &'static str,
    },

    /// Presentation image format changed across a surface recreation
    #[error("Surface format changed from {previous} to {current}")]
    SurfaceFormatMismatch { previous: String, current: String },

    /// Buffer creation or copy failed
    #[error("Buffer operation failed: {0}")]
    Buffer(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Config file could not be found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid tree error.
    pub fn invalid_tree(msg: impl Into<String>) -> Self {
        Self::InvalidTree(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error ends rendering. Everything the core reports is
    /// fatal except protocol misuse, which the caller can correct.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FrameState { .. })
    }
}

/// Result type alias for ray tracer operations.
pub type Result<T> = std::result::Result<T, Error>;
