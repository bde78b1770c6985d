use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::{
    DeliveryError, Message, MessageStatus, MessengerType, NewMessage, SchedulableProduct,
};

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: NewMessage) -> anyhow::Result<Message>;

    /// Bot messages for products, still `Created`, oldest first.
    async fn find_pending(&self, messenger: MessengerType) -> anyhow::Result<Vec<Message>>;

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        retry_count: u32,
        error: Option<DeliveryError>,
    ) -> anyhow::Result<()>;

    async fn get(&self, message_id: Uuid) -> anyhow::Result<Option<Message>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Products with linked keywords whose messages have not been scheduled.
    async fn find_schedulable(&self) -> anyhow::Result<Vec<SchedulableProduct>>;

    /// Marks the product scheduled and inserts its messages as one atomic unit.
    ///
    /// Returns `None` without writing anything when the product was already
    /// scheduled, e.g. by a concurrent run.
    async fn schedule_product(
        &self,
        product_id: Uuid,
        messages: Vec<NewMessage>,
    ) -> anyhow::Result<Option<Vec<Message>>>;
}
