//! Error types for the radsim engine.
//!
//! Expected quiz outcomes (a wrong placement, a timeout) are ordinary values
//! and never appear here. This module covers the exceptional conditions:
//! catalog lookups out of bounds, model assets that fail to load, bad
//! configuration, and commands that are not valid in the current state.

use std::path::PathBuf;

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while running a positioning quiz.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    // ========================================================================
    // Catalog Errors
    // ========================================================================
    /// Catalog index outside `[0, len)`.
    #[error("Exercise index {index} out of range (catalog has {len} exercises)")]
    OutOfRange {
        /// Requested index.
        index: usize,
        /// Catalog length.
        len: usize,
    },

    /// The catalog content is unusable.
    #[error("Invalid exercise catalog: {message}")]
    CatalogInvalid {
        /// What is wrong with the catalog.
        message: String,
    },

    // ========================================================================
    // Scene Errors
    // ========================================================================
    /// The rendering collaborator could not load an exercise model.
    #[error("Failed to load model '{model_ref}': {message}\n\nSuggestion: Check that the asset is served, then retry loading the exercise")]
    AssetLoad {
        /// Asset path of the model.
        model_ref: String,
        /// Failure description.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your radsim.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    // ========================================================================
    // Report Errors
    // ========================================================================
    /// The session reporter rejected an outcome or could not build the report.
    #[error("Report error: {0}")]
    Report(#[from] radsim_report::ReportError),

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Creates a new `OutOfRange` error.
    #[must_use]
    pub const fn out_of_range(index: usize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }

    /// Creates a new `CatalogInvalid` error.
    #[must_use]
    pub fn catalog_invalid(message: impl Into<String>) -> Self {
        Self::CatalogInvalid {
            message: message.into(),
        }
    }

    /// Creates a new `AssetLoad` error.
    #[must_use]
    pub fn asset_load(model_ref: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AssetLoad {
            model_ref: model_ref.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if the session can carry on after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AssetLoad { .. } | Self::InvalidStateTransition { .. }
        )
    }

    /// Returns `true` if this error indicates a defect or unusable setup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OutOfRange { .. }
                | Self::CatalogInvalid { .. }
                | Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
        )
    }
}
