use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    errors::DispatchError,
    models::{DispatchUnit, Transition},
    repositories::MessageRepository,
};

/// Writes the result of a delivery attempt back to the stored message.
#[derive(Clone)]
pub struct DeliveryOutcomeRecorder {
    repo: Arc<dyn MessageRepository>,
}

impl DeliveryOutcomeRecorder {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self { repo }
    }

    /// One write per attempt. Retries persist the incremented count so a
    /// restart resumes with the right history.
    pub async fn record(
        &self,
        unit: &DispatchUnit,
        transition: &Transition,
    ) -> Result<(), DispatchError> {
        let status = transition.status();
        let (retry_count, error) = match transition {
            Transition::Sent { .. } => (unit.retry_count, None),
            Transition::Retry { retry_count, .. } => (*retry_count, None),
            Transition::Failed { retry_count, error } => (*retry_count, Some(error.clone())),
        };

        self.repo
            .update_status(unit.message_id, status, retry_count, error)
            .await
            .map_err(|source| DispatchError::Persistence {
                message_id: unit.message_id,
                status,
                source,
            })?;

        debug!(message_id = %unit.message_id, %status, retry_count, "recorded delivery outcome");
        Ok(())
    }
}
