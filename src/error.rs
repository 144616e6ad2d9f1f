//! Error types for evidence-registry

use sled::transaction::TransactionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// Submission rejected before any write (zero content hash)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller is not the recorded provider of the evidence
    #[error("Authorization error: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TransactionError<RegistryError>> for RegistryError {
    fn from(err: TransactionError<RegistryError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => RegistryError::Database(e),
        }
    }
}

impl From<rmp_serde::encode::Error> for RegistryError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RegistryError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}
