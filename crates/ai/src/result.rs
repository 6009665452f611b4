use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wgrid_core::{EngineError, StoreId};

use crate::model::Finding;

/// Output of one scan job. Findings are not yet recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub store_id: StoreId,
    pub scanned_at: DateTime<Utc>,
    pub items_scanned: usize,
    /// Ordered by severity, then confidence.
    pub findings: Vec<Finding>,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid job input: {0}")]
    InvalidInput(String),

    #[error("store scope violation: {0}")]
    ScopeViolation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AiError> for EngineError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::InvalidInput(msg) => EngineError::validation(msg),
            AiError::ScopeViolation(msg) => EngineError::forbidden(msg),
            AiError::Internal(msg) => EngineError::conflict(msg),
        }
    }
}
