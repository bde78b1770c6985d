use thiserror::Error;
use uuid::Uuid;

use super::models::MessageStatus;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Rate limits that can never be honoured together. Raised before any send.
    #[error("Invalid rate limits: {0}")]
    Configuration(String),
    /// The outcome of a send attempt could not be written back.
    #[error("Failed to record status {status} for message {message_id}: {source}")]
    Persistence {
        message_id: Uuid,
        status: MessageStatus,
        #[source]
        source: anyhow::Error,
    },
}
