//! Engine error types

use thiserror::Error;

use scenario_clients::ClientError;
use scenario_core::RuleError;

/// Errors from rule lifecycle and synchronization operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any external call; fully recoverable
    #[error("invalid rule: {0}")]
    Validation(#[from] RuleError),

    /// Duplicate rule name; rejected before mutation
    #[error("rule '{0}' already exists")]
    Conflict(String),

    /// Unknown rule name or id; no mutation occurred
    #[error("rule '{0}' does not exist")]
    NotFound(String),

    /// A registry, scheduler, stream-engine, or command call failed.
    /// Multi-step synchronization is not transactional: steps applied
    /// before the failure are not rolled back.
    #[error("external call failed: {0}")]
    Client(#[from] ClientError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
