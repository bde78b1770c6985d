use std::sync::Arc;

use tracing::debug;

use crate::{
    application::{
        handlers::{
            message_dispatcher::{DispatchReport, MessageDispatcher},
            outcome_recorder::DeliveryOutcomeRecorder,
        },
        services::{clock::Clock, messenger::MessengerGateway},
    },
    domain::{
        models::{DispatchUnit, MessengerType},
        repositories::MessageRepository,
    },
};

pub struct SendMessagesConfig {
    pub max_retries: u32,
}

/// Delivers every pending message of one messenger.
pub struct SendMessagesUseCase {
    message_repo: Arc<dyn MessageRepository>,
    gateway: MessengerGateway,
    clock: Arc<dyn Clock>,
    config: SendMessagesConfig,
}

impl SendMessagesUseCase {
    pub fn new(
        message_repo: Arc<dyn MessageRepository>,
        gateway: MessengerGateway,
        clock: Arc<dyn Clock>,
        config: SendMessagesConfig,
    ) -> Self {
        Self {
            message_repo,
            gateway,
            clock,
            config,
        }
    }

    pub async fn execute(&self, messenger: MessengerType) -> anyhow::Result<DispatchReport> {
        let client = self
            .gateway
            .get(messenger)
            .ok_or_else(|| anyhow::anyhow!("no client registered for messenger {messenger}"))?;

        let mut dispatcher = MessageDispatcher::new(
            client,
            DeliveryOutcomeRecorder::new(self.message_repo.clone()),
            self.clock.clone(),
        )?;

        let max_retries = self.config.max_retries;
        dispatcher.extend(
            self.message_repo
                .find_pending(messenger)
                .await?
                .into_iter()
                .map(|message| DispatchUnit::new(message, max_retries)),
        );
        if dispatcher.is_empty() {
            debug!(%messenger, "no pending messages");
        }

        Ok(dispatcher.run().await)
    }
}
