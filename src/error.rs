use thiserror::Error;

use crate::backups::transport::TransportError;

/// Errors surfaced by the orchestrator's public operations.
///
/// Transient remote failures (probe timeouts, unreachable scan signals) are
/// captured as data by the engines and never show up here; this taxonomy
/// covers the outcomes a caller or the job layer has to branch on.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("A restore is already running for this website")]
    RestoreInProgress,
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Authorization and not-found failures are user-facing and must not be
    /// retried by the worker pool.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ServiceError::NotFound(_)
                | ServiceError::Unauthorized(_)
                | ServiceError::RestoreInProgress
                | ServiceError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_errors_are_not_retryable() {
        assert!(!ServiceError::NotFound("website".into()).is_retryable());
        assert!(!ServiceError::Unauthorized("backup".into()).is_retryable());
        assert!(!ServiceError::RestoreInProgress.is_retryable());
        assert!(ServiceError::Storage("s3 unreachable".into()).is_retryable());
    }
}
