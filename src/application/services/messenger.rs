use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    models::{DeliveryOutcome, DispatchUnit, MessengerType},
    value_objects::RateSpec,
};

/// Capability to deliver messages through one messenger.
///
/// `send` reports rejections and transport problems as
/// [`DeliveryOutcome::Failed`]; it is called sequentially, never concurrently.
#[async_trait]
pub trait MessengerClient: Send + Sync {
    fn messenger(&self) -> MessengerType;
    /// Limit for a single chat.
    fn chat_limit(&self) -> RateSpec;
    /// Limit across all chats.
    fn global_limit(&self) -> RateSpec;
    async fn send(&self, unit: &DispatchUnit) -> DeliveryOutcome;
}

#[derive(Clone)]
pub struct MessengerGateway {
    clients: HashMap<MessengerType, Arc<dyn MessengerClient>>,
}

impl MessengerGateway {
    pub fn new(clients: Vec<Arc<dyn MessengerClient>>) -> Self {
        let mut map = HashMap::new();
        for client in clients {
            map.insert(client.messenger(), client);
        }
        Self { clients: map }
    }

    pub fn get(&self, messenger: MessengerType) -> Option<Arc<dyn MessengerClient>> {
        self.clients.get(&messenger).cloned()
    }

    pub fn messengers(&self) -> Vec<MessengerType> {
        self.clients.keys().copied().collect()
    }
}
