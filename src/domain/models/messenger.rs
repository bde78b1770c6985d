use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessengerType {
    Telegram,
}

impl MessengerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessengerType::Telegram => "telegram",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "telegram" => Some(MessengerType::Telegram),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessengerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
