//! Utility types shared by the builder and the frame orchestrator.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`RenderConfig`] - Persistent configuration knobs

mod config;
mod error;

pub use config::*;
pub use error::*;
