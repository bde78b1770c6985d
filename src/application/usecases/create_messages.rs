use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    models::{Chat, NewMessage, SchedulableProduct, Sender},
    repositories::ProductRepository,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CreateMessagesResponse {
    pub products_scheduled: usize,
    pub messages_created: usize,
    /// Products another run claimed first.
    pub products_skipped: usize,
}

/// Turns keyword-matched products into one pending message per active chat.
pub struct CreateMessagesUseCase {
    product_repo: Arc<dyn ProductRepository>,
}

impl CreateMessagesUseCase {
    pub fn new(product_repo: Arc<dyn ProductRepository>) -> Self {
        Self { product_repo }
    }

    pub async fn execute(&self) -> anyhow::Result<CreateMessagesResponse> {
        let products = self.product_repo.find_schedulable().await?;
        let mut response = CreateMessagesResponse::default();

        for schedulable in products {
            let product_id = schedulable.product.id;
            let messages = build_messages(&schedulable);

            match self.product_repo.schedule_product(product_id, messages).await? {
                Some(created) => {
                    debug!(%product_id, messages = created.len(), "scheduled product messages");
                    response.products_scheduled += 1;
                    response.messages_created += created.len();
                }
                None => {
                    debug!(%product_id, "product already scheduled");
                    response.products_skipped += 1;
                }
            }
        }

        info!(
            products = response.products_scheduled,
            messages = response.messages_created,
            skipped = response.products_skipped,
            "created product messages"
        );
        Ok(response)
    }
}

/// One message per active chat, listing every keyword that reached that chat.
fn build_messages(schedulable: &SchedulableProduct) -> Vec<NewMessage> {
    let mut chats: Vec<(&Chat, Vec<String>)> = Vec::new();
    let mut positions: HashMap<Uuid, usize> = HashMap::new();

    for matched in &schedulable.matches {
        for chat in matched.chats.iter().filter(|chat| chat.is_active()) {
            let index = *positions.entry(chat.id).or_insert_with(|| {
                chats.push((chat, Vec::new()));
                chats.len() - 1
            });
            let keywords = &mut chats[index].1;
            if !keywords.contains(&matched.keyword.name) {
                keywords.push(matched.keyword.name.clone());
            }
        }
    }

    let product = &schedulable.product;
    chats
        .into_iter()
        .map(|(chat, keywords)| NewMessage {
            chat_id: chat.id,
            chat_reference: chat.reference.clone(),
            messenger: chat.messenger,
            product_id: Some(product.id),
            sender: Sender::Bot,
            text: product.notification_text(&keywords),
            keywords,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::models::{ChatState, Keyword, KeywordMatch, MessengerType, Product};

    fn chat(user_id: Uuid, state: ChatState) -> Chat {
        Chat {
            id: Uuid::new_v4(),
            user_id,
            messenger: MessengerType::Telegram,
            reference: "1001".to_string(),
            name: "Jo".to_string(),
            state,
            created_at: Utc::now(),
        }
    }

    fn keyword(user_id: Uuid, name: &str) -> Keyword {
        Keyword {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    fn product() -> Product {
        Product {
            id: Uuid::new_v4(),
            external_id: 1,
            name: "hot apple pie".to_string(),
            description: None,
            location: "Test Location".to_string(),
            sublocation: None,
            url: None,
            keywords_linked: true,
            messages_scheduled: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn merges_keywords_for_the_same_chat() {
        let user = Uuid::new_v4();
        let inbox = chat(user, ChatState::Active);
        let schedulable = SchedulableProduct {
            product: product(),
            matches: vec![
                KeywordMatch {
                    keyword: keyword(user, "apple"),
                    chats: vec![inbox.clone()],
                },
                KeywordMatch {
                    keyword: keyword(user, "pie"),
                    chats: vec![inbox.clone()],
                },
            ],
        };

        let messages = build_messages(&schedulable);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].chat_id, inbox.id);
        assert_eq!(messages[0].keywords, vec!["apple", "pie"]);
        assert!(messages[0].text.ends_with("Linked Keywords: apple, pie"));
    }

    #[test]
    fn skips_chats_that_are_not_active() {
        let user = Uuid::new_v4();
        let active = chat(user, ChatState::Active);
        let schedulable = SchedulableProduct {
            product: product(),
            matches: vec![KeywordMatch {
                keyword: keyword(user, "apple"),
                chats: vec![
                    chat(user, ChatState::Setup),
                    active.clone(),
                    chat(user, ChatState::Inactive),
                ],
            }],
        };

        let messages = build_messages(&schedulable);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].chat_id, active.id);
    }

    #[test]
    fn keywords_are_listed_per_chat() {
        let first_user = Uuid::new_v4();
        let second_user = Uuid::new_v4();
        let first_chat = chat(first_user, ChatState::Active);
        let second_chat = chat(second_user, ChatState::Active);
        let schedulable = SchedulableProduct {
            product: product(),
            matches: vec![
                KeywordMatch {
                    keyword: keyword(first_user, "apple"),
                    chats: vec![first_chat.clone()],
                },
                KeywordMatch {
                    keyword: keyword(second_user, "pie"),
                    chats: vec![second_chat.clone()],
                },
            ],
        };

        let messages = build_messages(&schedulable);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].keywords, vec!["apple"]);
        assert_eq!(messages[1].keywords, vec!["pie"]);
    }

    #[test]
    fn duplicate_keyword_names_are_listed_once() {
        let user = Uuid::new_v4();
        let other_user = Uuid::new_v4();
        let shared = chat(user, ChatState::Active);
        let schedulable = SchedulableProduct {
            product: product(),
            matches: vec![
                KeywordMatch {
                    keyword: keyword(user, "apple"),
                    chats: vec![shared.clone()],
                },
                KeywordMatch {
                    keyword: keyword(other_user, "apple"),
                    chats: vec![shared.clone()],
                },
            ],
        };

        let messages = build_messages(&schedulable);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].keywords, vec!["apple"]);
    }

    #[test]
    fn no_active_chat_means_no_messages() {
        let user = Uuid::new_v4();
        let schedulable = SchedulableProduct {
            product: product(),
            matches: vec![KeywordMatch {
                keyword: keyword(user, "apple"),
                chats: vec![chat(user, ChatState::Setup)],
            }],
        };

        assert!(build_messages(&schedulable).is_empty());
    }
}
