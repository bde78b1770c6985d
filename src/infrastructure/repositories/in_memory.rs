use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    errors::DomainError,
    models::{
        Chat, DeliveryError, Keyword, KeywordMatch, Message, MessageStatus, MessengerType,
        NewMessage, Product, SchedulableProduct, Sender,
    },
    repositories::{MessageRepository, ProductRepository},
};

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Arc<RwLock<HashMap<Uuid, Message>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self) -> Vec<Message> {
        let messages = self.messages.read().await;
        let mut all: Vec<Message> = messages.values().cloned().collect();
        all.sort_by_key(|m| m.created_at);
        all
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: NewMessage) -> anyhow::Result<Message> {
        let message = message.into_message(Uuid::new_v4(), Utc::now());
        let mut messages = self.messages.write().await;
        messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_pending(&self, messenger: MessengerType) -> anyhow::Result<Vec<Message>> {
        let messages = self.messages.read().await;
        let mut pending: Vec<Message> = messages
            .values()
            .filter(|m| {
                m.messenger == messenger
                    && m.status == MessageStatus::Created
                    && m.sender == Sender::Bot
                    && m.product_id.is_some()
            })
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.created_at);
        Ok(pending)
    }

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        retry_count: u32,
        error: Option<DeliveryError>,
    ) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        let entry = messages
            .get_mut(&message_id)
            .ok_or_else(|| DomainError::NotFound(format!("message {message_id}")))?;
        if entry.status.is_terminal() {
            return Err(DomainError::Validation(format!(
                "message {message_id} is already {}",
                entry.status
            ))
            .into());
        }
        entry.status = status;
        entry.retry_count = retry_count;
        entry.error = error;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, message_id: Uuid) -> anyhow::Result<Option<Message>> {
        let messages = self.messages.read().await;
        Ok(messages.get(&message_id).cloned())
    }
}

#[derive(Default)]
struct Catalog {
    products: HashMap<Uuid, Product>,
    keywords: HashMap<Uuid, Keyword>,
    chats: HashMap<Uuid, Chat>,
    /// product id -> linked keyword ids, in link order
    links: HashMap<Uuid, Vec<Uuid>>,
}

/// Products, keywords and chats kept in memory. Scheduling writes into the
/// shared message repository while holding the catalog lock.
pub struct InMemoryProductRepository {
    catalog: Arc<RwLock<Catalog>>,
    messages: Arc<InMemoryMessageRepository>,
}

impl InMemoryProductRepository {
    pub fn new(messages: Arc<InMemoryMessageRepository>) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(Catalog::default())),
            messages,
        }
    }

    pub async fn add_chat(&self, chat: Chat) {
        self.catalog.write().await.chats.insert(chat.id, chat);
    }

    pub async fn add_keyword(&self, keyword: Keyword) {
        self.catalog.write().await.keywords.insert(keyword.id, keyword);
    }

    pub async fn add_product(&self, product: Product) {
        self.catalog.write().await.products.insert(product.id, product);
    }

    pub async fn link_keyword(&self, product_id: Uuid, keyword_id: Uuid) -> anyhow::Result<()> {
        let mut catalog = self.catalog.write().await;
        if !catalog.keywords.contains_key(&keyword_id) {
            return Err(DomainError::NotFound(format!("keyword {keyword_id}")).into());
        }
        let product = catalog
            .products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::NotFound(format!("product {product_id}")))?;
        product.keywords_linked = true;

        let links = catalog.links.entry(product_id).or_default();
        if !links.contains(&keyword_id) {
            links.push(keyword_id);
        }
        Ok(())
    }

    pub async fn get_product(&self, product_id: Uuid) -> Option<Product> {
        self.catalog.read().await.products.get(&product_id).cloned()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_schedulable(&self) -> anyhow::Result<Vec<SchedulableProduct>> {
        let catalog = self.catalog.read().await;
        let mut products: Vec<&Product> = catalog
            .products
            .values()
            .filter(|p| p.is_schedulable())
            .collect();
        products.sort_by_key(|p| p.created_at);

        let schedulable = products
            .into_iter()
            .map(|product| {
                let matches = catalog
                    .links
                    .get(&product.id)
                    .into_iter()
                    .flatten()
                    .filter_map(|keyword_id| catalog.keywords.get(keyword_id))
                    .map(|keyword| {
                        let mut chats: Vec<Chat> = catalog
                            .chats
                            .values()
                            .filter(|c| c.user_id == keyword.user_id)
                            .cloned()
                            .collect();
                        chats.sort_by_key(|c| c.created_at);
                        KeywordMatch {
                            keyword: keyword.clone(),
                            chats,
                        }
                    })
                    .collect();
                SchedulableProduct {
                    product: product.clone(),
                    matches,
                }
            })
            .collect();

        Ok(schedulable)
    }

    async fn schedule_product(
        &self,
        product_id: Uuid,
        messages: Vec<NewMessage>,
    ) -> anyhow::Result<Option<Vec<Message>>> {
        let mut catalog = self.catalog.write().await;
        let product = catalog
            .products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::NotFound(format!("product {product_id}")))?;
        if product.messages_scheduled {
            return Ok(None);
        }

        let mut stored = self.messages.messages.write().await;
        let now = Utc::now();
        let created: Vec<Message> = messages
            .into_iter()
            .map(|message| message.into_message(Uuid::new_v4(), now))
            .collect();
        for message in &created {
            stored.insert(message.id, message.clone());
        }
        product.messages_scheduled = true;

        Ok(Some(created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ChatState;

    fn new_message(messenger: MessengerType, sender: Sender, product_id: Option<Uuid>) -> NewMessage {
        NewMessage {
            chat_id: Uuid::new_v4(),
            chat_reference: "12".to_string(),
            messenger,
            product_id,
            sender,
            text: "hi".to_string(),
            keywords: vec![],
        }
    }

    #[tokio::test]
    async fn find_pending_only_returns_created_bot_product_messages() {
        let repo = InMemoryMessageRepository::new();
        let pending = repo
            .create(new_message(MessengerType::Telegram, Sender::Bot, Some(Uuid::new_v4())))
            .await
            .unwrap();
        repo.create(new_message(MessengerType::Telegram, Sender::User, Some(Uuid::new_v4())))
            .await
            .unwrap();
        repo.create(new_message(MessengerType::Telegram, Sender::Bot, None))
            .await
            .unwrap();
        let sent = repo
            .create(new_message(MessengerType::Telegram, Sender::Bot, Some(Uuid::new_v4())))
            .await
            .unwrap();
        repo.update_status(sent.id, MessageStatus::Sent, 0, None)
            .await
            .unwrap();

        let found = repo.find_pending(MessengerType::Telegram).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, pending.id);
    }

    #[tokio::test]
    async fn final_status_is_never_overwritten() {
        let repo = InMemoryMessageRepository::new();
        let message = repo
            .create(new_message(MessengerType::Telegram, Sender::Bot, Some(Uuid::new_v4())))
            .await
            .unwrap();
        repo.update_status(message.id, MessageStatus::Sent, 1, None)
            .await
            .unwrap();

        let result = repo
            .update_status(message.id, MessageStatus::Created, 2, None)
            .await;

        assert!(result.is_err());
        let stored = repo.get(message.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Sent);
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn update_status_of_unknown_message_fails() {
        let repo = InMemoryMessageRepository::new();

        let result = repo
            .update_status(Uuid::new_v4(), MessageStatus::Sent, 0, None)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn schedule_product_claims_once() {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let repo = InMemoryProductRepository::new(messages.clone());
        let user_id = Uuid::new_v4();
        let chat = Chat {
            id: Uuid::new_v4(),
            user_id,
            messenger: MessengerType::Telegram,
            reference: "12".to_string(),
            name: "Sam".to_string(),
            state: ChatState::Active,
            created_at: Utc::now(),
        };
        let keyword = Keyword {
            id: Uuid::new_v4(),
            user_id,
            name: "lamp".to_string(),
            created_at: Utc::now(),
        };
        let product = Product {
            id: Uuid::new_v4(),
            external_id: 7,
            name: "Desk lamp".to_string(),
            description: None,
            location: "York".to_string(),
            sublocation: None,
            url: None,
            keywords_linked: false,
            messages_scheduled: false,
            created_at: Utc::now(),
        };
        let product_id = product.id;
        repo.add_chat(chat).await;
        repo.add_keyword(keyword.clone()).await;
        repo.add_product(product).await;
        repo.link_keyword(product_id, keyword.id).await.unwrap();

        let schedulable = repo.find_schedulable().await.unwrap();
        assert_eq!(schedulable.len(), 1);
        assert_eq!(schedulable[0].matches[0].chats.len(), 1);

        let message = new_message(MessengerType::Telegram, Sender::Bot, Some(product_id));
        let first = repo
            .schedule_product(product_id, vec![message.clone()])
            .await
            .unwrap();
        let second = repo
            .schedule_product(product_id, vec![message])
            .await
            .unwrap();

        assert_eq!(first.map(|m| m.len()), Some(1));
        assert!(second.is_none());
        assert_eq!(messages.list().await.len(), 1);
        assert!(repo.find_schedulable().await.unwrap().is_empty());
    }
}
