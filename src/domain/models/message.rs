use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::messenger::MessengerType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageStatus {
    Created,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Created => "created",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "created" => Some(MessageStatus::Created),
            "sent" => Some(MessageStatus::Sent),
            "failed" => Some(MessageStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Failed)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Sender {
    /// Product notifications produced by the service.
    Bot,
    /// Replies to something the user did, e.g. a welcome message.
    User,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::Bot => "bot",
            Sender::User => "user",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "bot" => Some(Sender::Bot),
            "user" => Some(Sender::User),
            _ => None,
        }
    }
}

/// Error reported by a messenger for a rejected delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryError {
    pub code: i32,
    pub message: String,
}

/// Result of one delivery attempt. Rejections are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { sent_at: DateTime<Utc> },
    Failed { error: DeliveryError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub chat_reference: String,
    pub messenger: MessengerType,
    pub product_id: Option<Uuid>,
    pub sender: Sender,
    pub text: String,
    pub keywords: Vec<String>,
    pub status: MessageStatus,
    pub retry_count: u32,
    pub error: Option<DeliveryError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub chat_reference: String,
    pub messenger: MessengerType,
    pub product_id: Option<Uuid>,
    pub sender: Sender,
    pub text: String,
    pub keywords: Vec<String>,
}

impl NewMessage {
    pub fn into_message(self, id: Uuid, now: DateTime<Utc>) -> Message {
        Message {
            id,
            chat_id: self.chat_id,
            chat_reference: self.chat_reference,
            messenger: self.messenger,
            product_id: self.product_id,
            sender: self.sender,
            text: self.text,
            keywords: self.keywords,
            status: MessageStatus::Created,
            retry_count: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
