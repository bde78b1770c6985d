pub mod chat;
pub mod dispatch;
pub mod message;
pub mod messenger;
pub mod product;

pub use chat::{Chat, ChatState};
pub use dispatch::{DispatchUnit, Transition};
pub use message::{DeliveryError, DeliveryOutcome, Message, MessageStatus, NewMessage, Sender};
pub use messenger::MessengerType;
pub use product::{
    Keyword, KeywordMatch, LINKED_KEYWORDS_MARKER, Product, SchedulableProduct, linked_keywords,
};
