//! Error types for the time-accounting engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate.
//! Domain errors are status-coded rather than exception-typed: every variant
//! maps to a stable numeric status that the boundary layer turns into a
//! response (see [`crate::api`]).

use thiserror::Error;

/// The main error type for the engine.
///
/// All service operations return this error type. Calculators in
/// [`crate::calculation`] are total over well-formed input and only surface
/// validation or conflict errors where a rule explicitly demands it.
///
/// # Example
///
/// ```
/// use timepay_engine::error::EngineError;
///
/// let error = EngineError::conflict("deduction profile version mismatch");
/// assert_eq!(error.status_code(), 409);
/// assert_eq!(error.to_string(), "deduction profile version mismatch");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No actor, or the actor lacks the tenant context it needs.
    #[error("{message}")]
    Unauthenticated {
        /// A description of what was missing.
        message: String,
    },

    /// The actor is known but lacks the required permission.
    #[error("{message}")]
    Forbidden {
        /// A description of the denied action.
        message: String,
    },

    /// The entity does not exist or lies outside the actor's tenant scope.
    #[error("{message}")]
    NotFound {
        /// A description of the missing entity.
        message: String,
    },

    /// A state-machine, concurrency or feature-flag conflict.
    #[error("{message}")]
    Conflict {
        /// A description of the conflict.
        message: String,
    },

    /// Malformed input rejected before any calculator runs.
    #[error("{message}")]
    Validation {
        /// A description of the invalid input.
        message: String,
    },

    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// The repository failed in a way the caller cannot correct.
    #[error("Storage error: {message}")]
    Storage {
        /// A description of the storage failure.
        message: String,
    },
}

impl EngineError {
    /// Creates an [`EngineError::Unauthenticated`] error.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates an [`EngineError::Forbidden`] error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates an [`EngineError::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an [`EngineError::Conflict`] error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an [`EngineError::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an [`EngineError::Storage`] error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Returns the stable HTTP-equivalent status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Validation { .. } => 400,
            Self::ConfigNotFound { .. } | Self::ConfigParseError { .. } | Self::Storage { .. } => {
                500
            }
        }
    }

    /// Returns true for conflict-class errors.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
