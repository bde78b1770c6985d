use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::messenger::MessengerType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatState {
    /// Linked to an account but not confirmed yet.
    Setup,
    Active,
    Inactive,
}

impl ChatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatState::Setup => "setup",
            ChatState::Active => "active",
            ChatState::Inactive => "inactive",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "setup" => Some(ChatState::Setup),
            "active" => Some(ChatState::Active),
            "inactive" => Some(ChatState::Inactive),
            _ => None,
        }
    }
}

/// A destination that notifications are delivered to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub messenger: MessengerType,
    /// Recipient address at the messenger, e.g. the Telegram chat id.
    pub reference: String,
    pub name: String,
    pub state: ChatState,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_active(&self) -> bool {
        self.state == ChatState::Active
    }
}
