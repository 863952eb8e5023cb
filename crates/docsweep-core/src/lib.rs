//! Docsweep Core - sandboxed source access, policy checks, and the run pipeline
//!
//! This crate provides the foundational types and logic for Docsweep.
//!
//! # Modules
//!
//! - [`sandbox`] - Read-only, root-contained file access
//! - [`header`] - Structural header policy checks
//! - [`secrets`] - Heuristic secret-leak detection
//! - [`redaction`] - Value masking used by every finding excerpt
//! - [`docs`] - Source truncation, markdown cleanup, and output naming
//! - [`pipeline`] - The five-stage run orchestrator
//! - [`config`] - Pipeline configuration

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod config;
pub mod docs;
pub mod header;
pub mod models;
pub mod pipeline;
pub mod redaction;
pub mod sandbox;
pub mod secrets;

pub use config::*;
pub use header::{HeaderValidator, ModifiedTime, SystemModifiedTime};
pub use models::*;
pub use pipeline::{DocGenerator, Pipeline};
pub use sandbox::{DecodeMode, SandboxedStore};
pub use secrets::SecretScanner;

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Docsweep
///
/// Per-operation variants (`ContainmentViolation`, `NotFound`, `TooLarge`,
/// `Generation`, ...) are recorded against a single file by the pipeline.
/// Structural variants abort a run, see [`DocsweepError::is_structural`].
#[derive(Error, Debug)]
pub enum DocsweepError {
    /// The sandbox root does not exist or is not a directory
    #[error("Sandbox root not found: {}", path.display())]
    RootNotFound {
        /// Path as given by the caller
        path: PathBuf,
    },

    /// A path resolved outside the sandbox root
    #[error("Access outside sandbox is forbidden: {}", path.display())]
    ContainmentViolation {
        /// The resolved path that escaped the root
        path: PathBuf,
    },

    /// Target is missing or not a regular file
    #[error("File not found: {}", path.display())]
    NotFound {
        /// The resolved path
        path: PathBuf,
    },

    /// Target exceeds the per-read byte ceiling
    #[error("File too large ({size} bytes, limit {max}). Refusing to read: {}", path.display())]
    TooLarge {
        /// The resolved path
        path: PathBuf,
        /// Size reported by the filesystem
        size: u64,
        /// Configured ceiling
        max: u64,
    },

    /// Content is not valid UTF-8 (strict decode mode only)
    #[error("Invalid UTF-8 in {}", path.display())]
    InvalidUtf8 {
        /// The resolved path
        path: PathBuf,
    },

    /// File metadata could not be retrieved while checking a header date
    #[error("Cannot read modification time of {}: {source}", path.display())]
    Metadata {
        /// File whose metadata was requested
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The root could not be enumerated
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// The generation capability failed for one file, or returned empty content
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The generation capability's transport cannot be reached
    #[error("Generation transport unavailable: {0}")]
    Transport(String),

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocsweepError {
    /// Whether this error aborts the whole run rather than a single file.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DocsweepError::RootNotFound { .. }
                | DocsweepError::Discovery(_)
                | DocsweepError::Transport(_)
                | DocsweepError::Cancelled
        )
    }
}

/// Result type alias using [`DocsweepError`]
pub type Result<T> = std::result::Result<T, DocsweepError>;
