use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chat::Chat;

/// Line that introduces the comma separated keyword list in a notification.
pub const LINKED_KEYWORDS_MARKER: &str = "Linked Keywords:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub external_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub sublocation: Option<String>,
    pub url: Option<String>,
    /// Set once keyword matching has linked keywords to the product.
    pub keywords_linked: bool,
    /// Set exactly once, together with the creation of its messages.
    pub messages_scheduled: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_schedulable(&self) -> bool {
        self.keywords_linked && !self.messages_scheduled
    }

    /// Notification text for one chat, listing the keywords that matched for it.
    pub fn notification_text(&self, keywords: &[String]) -> String {
        let mut text = self.name.clone();

        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            text.push_str("\n\n");
            text.push_str(description.trim());
        }

        text.push_str("\n\nLocation: ");
        text.push_str(&self.location);
        if let Some(sublocation) = &self.sublocation {
            text.push_str(&format!(" ({sublocation})"));
        }

        if let Some(url) = &self.url {
            text.push('\n');
            text.push_str(url);
        }

        text.push_str(&format!("\n\n{} {}", LINKED_KEYWORDS_MARKER, keywords.join(", ")));
        text
    }
}

/// Reads the keyword list back out of a notification text.
pub fn linked_keywords(text: &str) -> Vec<String> {
    text.lines()
        .rev()
        .find_map(|line| line.strip_prefix(LINKED_KEYWORDS_MARKER))
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A keyword linked to a product, with every chat of the keyword's owner.
#[derive(Debug, Clone)]
pub struct KeywordMatch {
    pub keyword: Keyword,
    pub chats: Vec<Chat>,
}

#[derive(Debug, Clone)]
pub struct SchedulableProduct {
    pub product: Product,
    pub matches: Vec<KeywordMatch>,
}
