use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{DeliveryError, DeliveryOutcome, Message, MessageStatus};

/// One pending message for one chat, as held by the dispatch queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchUnit {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub chat_reference: String,
    pub product_id: Option<Uuid>,
    pub keywords: Vec<String>,
    pub text: String,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl DispatchUnit {
    /// Resumes from the persisted retry count so restarts keep history.
    pub fn new(message: Message, max_retries: u32) -> Self {
        Self {
            message_id: message.id,
            chat_id: message.chat_id,
            chat_reference: message.chat_reference,
            product_id: message.product_id,
            keywords: message.keywords,
            text: message.text,
            retry_count: message.retry_count,
            max_retries,
        }
    }

    /// Where a delivery attempt leaves this unit.
    pub fn resolve(&self, outcome: &DeliveryOutcome) -> Transition {
        match outcome {
            DeliveryOutcome::Delivered { sent_at } => Transition::Sent { sent_at: *sent_at },
            DeliveryOutcome::Failed { error } if self.retry_count < self.max_retries => {
                Transition::Retry {
                    retry_count: self.retry_count + 1,
                    error: error.clone(),
                }
            }
            DeliveryOutcome::Failed { error } => Transition::Failed {
                retry_count: self.retry_count,
                error: error.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Sent {
        sent_at: DateTime<Utc>,
    },
    /// Stays `Created` and goes back to the end of the queue.
    Retry {
        retry_count: u32,
        error: DeliveryError,
    },
    Failed {
        retry_count: u32,
        error: DeliveryError,
    },
}

impl Transition {
    pub fn status(&self) -> MessageStatus {
        match self {
            Transition::Sent { .. } => MessageStatus::Sent,
            Transition::Retry { .. } => MessageStatus::Created,
            Transition::Failed { .. } => MessageStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(retry_count: u32) -> DispatchUnit {
        DispatchUnit {
            message_id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            chat_reference: "100".to_string(),
            product_id: None,
            keywords: vec![],
            text: "hello".to_string(),
            retry_count,
            max_retries: 3,
        }
    }

    fn failure() -> DeliveryOutcome {
        DeliveryOutcome::Failed {
            error: DeliveryError {
                code: 429,
                message: "Too Many Requests".to_string(),
            },
        }
    }

    #[test]
    fn failure_below_ceiling_is_retried() {
        let transition = unit(2).resolve(&failure());

        assert!(matches!(transition, Transition::Retry { retry_count: 3, .. }));
        assert_eq!(transition.status(), MessageStatus::Created);
    }

    #[test]
    fn failure_at_ceiling_is_terminal() {
        let transition = unit(3).resolve(&failure());

        match transition {
            Transition::Failed { retry_count, error } => {
                assert_eq!(retry_count, 3);
                assert_eq!(error.code, 429);
            }
            other => panic!("unexpected transition {other:?}"),
        }
    }

    #[test]
    fn delivery_keeps_retry_count_untouched() {
        let sent_at = Utc::now();
        let transition = unit(1).resolve(&DeliveryOutcome::Delivered { sent_at });

        assert_eq!(transition, Transition::Sent { sent_at });
        assert_eq!(transition.status(), MessageStatus::Sent);
    }
}
