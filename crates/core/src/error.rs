//! Engine error model.

use serde::Serialize;
use thiserror::Error;

/// Result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
///
/// Every variant maps to a stable [`ErrorKind`] plus a human-readable reason, so
/// callers can always tell "nothing to do" (an empty result) from a failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown store '{0}'")]
    UnknownStore(String),

    #[error("unknown sku '{sku}' at store '{store}'")]
    UnknownSku { store: String, sku: String },

    #[error("insufficient stock for '{sku}' at store '{store}': requested {requested}, available {available}")]
    InsufficientStock {
        store: String,
        sku: String,
        requested: u64,
        available: u64,
    },

    /// A negotiation or anomaly was not in a state that accepts the intent.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed input (quantity, objective, ids). Raised before any mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Lock contention that outlived the retry budget.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Stable, machine-readable error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownStore,
    UnknownSku,
    InsufficientStock,
    InvalidTransition,
    Forbidden,
    ValidationError,
    NotFound,
    Conflict,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownStore => "unknown_store",
            ErrorKind::UnknownSku => "unknown_sku",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownStore(_) => ErrorKind::UnknownStore,
            EngineError::UnknownSku { .. } => ErrorKind::UnknownSku,
            EngineError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            EngineError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::Validation(_) => ErrorKind::ValidationError,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
        }
    }

    pub fn unknown_store(store: impl core::fmt::Display) -> Self {
        Self::UnknownStore(store.to_string())
    }

    pub fn unknown_sku(store: impl core::fmt::Display, sku: impl core::fmt::Display) -> Self {
        Self::UnknownSku {
            store: store.to_string(),
            sku: sku.to_string(),
        }
    }

    pub fn insufficient_stock(
        store: impl core::fmt::Display,
        sku: impl core::fmt::Display,
        requested: u64,
        available: u64,
    ) -> Self {
        Self::InsufficientStock {
            store: store.to_string(),
            sku: sku.to_string(),
            requested,
            available,
        }
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
