use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use crate::domain::{
    errors::DomainError,
    models::{
        Chat, ChatState, DeliveryError, Keyword, KeywordMatch, Message, MessageStatus,
        MessengerType, NewMessage, Product, SchedulableProduct, Sender,
    },
    repositories::{MessageRepository, ProductRepository},
};

pub type PgPool = Pool<Postgres>;

#[derive(Clone)]
pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

const MESSAGE_COLUMNS: &str = r#"
    m.id, m.chat_id, c.reference AS chat_reference, c.messenger, m.product_id, m.sender,
    m.text, m.keywords, m.status, m.retry_count, m.error_code, m.error_msg,
    m.created_at, m.updated_at
"#;

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn create(&self, message: NewMessage) -> anyhow::Result<Message> {
        let message = message.into_message(Uuid::new_v4(), Utc::now());
        insert_message(&self.pool, &message).await?;
        Ok(message)
    }

    async fn find_pending(&self, messenger: MessengerType) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages m
            JOIN chats c ON c.id = m.chat_id
            WHERE m.status = 'created'
              AND m.sender = 'bot'
              AND m.product_id IS NOT NULL
              AND c.messenger = $1
            ORDER BY m.created_at, m.id
            "#
        ))
        .bind(messenger.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Message::try_from).collect()
    }

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        retry_count: u32,
        error: Option<DeliveryError>,
    ) -> anyhow::Result<()> {
        let (error_code, error_msg) = match error {
            Some(error) => (Some(error.code), Some(error.message)),
            None => (None, None),
        };
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = $2,
                retry_count = $3,
                error_code = $4,
                error_msg = $5,
                updated_at = $6
            WHERE id = $1 AND status = 'created'
            "#,
        )
        .bind(message_id)
        .bind(status.as_str())
        .bind(retry_count as i32)
        .bind(error_code)
        .bind(error_msg)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(
                DomainError::NotFound(format!("pending message {message_id}")).into(),
            );
        }
        Ok(())
    }

    async fn get(&self, message_id: Uuid) -> anyhow::Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages m
            JOIN chats c ON c.id = m.chat_id
            WHERE m.id = $1
            "#
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        record.map(Message::try_from).transpose()
    }
}

#[derive(Clone)]
pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn find_schedulable(&self) -> anyhow::Result<Vec<SchedulableProduct>> {
        let products = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, external_id, name, description, location, sublocation, url,
                   keywords_linked, messages_scheduled, created_at
            FROM products
            WHERE keywords_linked AND NOT messages_scheduled
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut schedulable = Vec::with_capacity(products.len());
        for product in products {
            let rows = sqlx::query_as::<_, KeywordChatRecord>(
                r#"
                SELECT k.id AS keyword_id, k.user_id, k.name AS keyword_name,
                       k.created_at AS keyword_created_at,
                       c.id AS chat_id, c.messenger, c.reference, c.name AS chat_name,
                       c.state, c.created_at AS chat_created_at
                FROM product_keywords pk
                JOIN keywords k ON k.id = pk.keyword_id
                LEFT JOIN chats c ON c.user_id = k.user_id
                WHERE pk.product_id = $1
                ORDER BY k.created_at, k.id, c.created_at
                "#,
            )
            .bind(product.id)
            .fetch_all(&self.pool)
            .await?;

            schedulable.push(SchedulableProduct {
                product: product.into(),
                matches: group_keyword_chats(rows)?,
            });
        }
        Ok(schedulable)
    }

    async fn schedule_product(
        &self,
        product_id: Uuid,
        messages: Vec<NewMessage>,
    ) -> anyhow::Result<Option<Vec<Message>>> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE products
            SET messages_scheduled = TRUE
            WHERE id = $1 AND NOT messages_scheduled
            "#,
        )
        .bind(product_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(messages.len());
        for message in messages {
            let message = message.into_message(Uuid::new_v4(), now);
            insert_message(&mut *tx, &message).await?;
            created.push(message);
        }

        tx.commit().await?;
        Ok(Some(created))
    }
}

async fn insert_message<'e, E>(executor: E, message: &Message) -> anyhow::Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO messages (
            id, chat_id, product_id, sender, text, keywords, status, retry_count,
            error_code, error_msg, created_at, updated_at
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
        "#,
    )
    .bind(message.id)
    .bind(message.chat_id)
    .bind(message.product_id)
    .bind(message.sender.as_str())
    .bind(&message.text)
    .bind(&message.keywords)
    .bind(message.status.as_str())
    .bind(message.retry_count as i32)
    .bind(message.error.as_ref().map(|e| e.code))
    .bind(message.error.as_ref().map(|e| e.message.clone()))
    .bind(message.created_at)
    .bind(message.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

fn group_keyword_chats(rows: Vec<KeywordChatRecord>) -> anyhow::Result<Vec<KeywordMatch>> {
    let mut matches: Vec<KeywordMatch> = Vec::new();
    for row in rows {
        if matches.last().map(|m| m.keyword.id) != Some(row.keyword_id) {
            matches.push(KeywordMatch {
                keyword: Keyword {
                    id: row.keyword_id,
                    user_id: row.user_id,
                    name: row.keyword_name.clone(),
                    created_at: row.keyword_created_at,
                },
                chats: Vec::new(),
            });
        }
        if let Some(chat) = row.into_chat()? {
            if let Some(current) = matches.last_mut() {
                current.chats.push(chat);
            }
        }
    }
    Ok(matches)
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    chat_id: Uuid,
    chat_reference: String,
    messenger: String,
    product_id: Option<Uuid>,
    sender: String,
    text: String,
    keywords: Vec<String>,
    status: String,
    retry_count: i32,
    error_code: Option<i32>,
    error_msg: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = anyhow::Error;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let messenger = MessengerType::from_str(&value.messenger)
            .ok_or_else(|| anyhow::anyhow!("unknown messenger {}", value.messenger))?;
        let sender = Sender::from_str(&value.sender)
            .ok_or_else(|| anyhow::anyhow!("unknown sender {}", value.sender))?;
        let status = MessageStatus::from_str(&value.status)
            .ok_or_else(|| anyhow::anyhow!("unknown message status {}", value.status))?;
        let error = match (value.error_code, value.error_msg) {
            (Some(code), message) => Some(DeliveryError {
                code,
                message: message.unwrap_or_default(),
            }),
            (None, _) => None,
        };

        Ok(Self {
            id: value.id,
            chat_id: value.chat_id,
            chat_reference: value.chat_reference,
            messenger,
            product_id: value.product_id,
            sender,
            text: value.text,
            keywords: value.keywords,
            status,
            retry_count: value.retry_count.max(0) as u32,
            error,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ProductRecord {
    id: Uuid,
    external_id: i64,
    name: String,
    description: Option<String>,
    location: String,
    sublocation: Option<String>,
    url: Option<String>,
    keywords_linked: bool,
    messages_scheduled: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductRecord> for Product {
    fn from(value: ProductRecord) -> Self {
        Self {
            id: value.id,
            external_id: value.external_id,
            name: value.name,
            description: value.description,
            location: value.location,
            sublocation: value.sublocation,
            url: value.url,
            keywords_linked: value.keywords_linked,
            messages_scheduled: value.messages_scheduled,
            created_at: value.created_at,
        }
    }
}

#[derive(FromRow)]
struct KeywordChatRecord {
    keyword_id: Uuid,
    user_id: Uuid,
    keyword_name: String,
    keyword_created_at: DateTime<Utc>,
    chat_id: Option<Uuid>,
    messenger: Option<String>,
    reference: Option<String>,
    chat_name: Option<String>,
    state: Option<String>,
    chat_created_at: Option<DateTime<Utc>>,
}

impl KeywordChatRecord {
    /// `None` when the keyword's owner has no chat.
    fn into_chat(self) -> anyhow::Result<Option<Chat>> {
        let (Some(id), Some(messenger), Some(reference), Some(state), Some(created_at)) = (
            self.chat_id,
            self.messenger,
            self.reference,
            self.state,
            self.chat_created_at,
        ) else {
            return Ok(None);
        };

        let messenger = MessengerType::from_str(&messenger)
            .ok_or_else(|| anyhow::anyhow!("unknown messenger {messenger}"))?;
        let state =
            ChatState::from_str(&state).ok_or_else(|| anyhow::anyhow!("unknown chat state {state}"))?;

        Ok(Some(Chat {
            id,
            user_id: self.user_id,
            messenger,
            reference,
            name: self.chat_name.unwrap_or_default(),
            state,
            created_at,
        }))
    }
}
