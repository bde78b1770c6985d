use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    application::services::messenger::MessengerClient,
    domain::{errors::DispatchError, value_objects::RateSpec},
};

/// Minimum spacing between sends to one chat and between any two sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendIntervals {
    pub chat: Duration,
    pub global: Duration,
}

impl SendIntervals {
    pub fn new(chat: RateSpec, global: RateSpec) -> Result<Self, DispatchError> {
        chat.validate()
            .map_err(|err| DispatchError::Configuration(format!("chat limit {chat}: {err}")))?;
        global
            .validate()
            .map_err(|err| DispatchError::Configuration(format!("global limit {global}: {err}")))?;

        if chat.normalized() > global.normalized() {
            return Err(DispatchError::Configuration(format!(
                "chat limit {chat} cannot be greater than global limit {global}"
            )));
        }

        Ok(Self {
            chat: chat.interval(),
            global: global.interval(),
        })
    }

    pub fn for_client(client: &dyn MessengerClient) -> Result<Self, DispatchError> {
        Self::new(client.chat_limit(), client.global_limit())
    }

    /// Time left before `chat_last_sent`'s chat may receive again. Zero when ready.
    pub fn chat_wait(&self, now: DateTime<Utc>, chat_last_sent: Option<DateTime<Utc>>) -> Duration {
        remaining(self.chat, now, chat_last_sent)
    }

    /// Time left before anything may be sent again. Zero when ready.
    pub fn global_wait(&self, now: DateTime<Utc>, last_sent: Option<DateTime<Utc>>) -> Duration {
        remaining(self.global, now, last_sent)
    }
}

fn remaining(interval: Duration, now: DateTime<Utc>, last_sent: Option<DateTime<Utc>>) -> Duration {
    let Some(last_sent) = last_sent else {
        return Duration::ZERO;
    };
    // A send stamped in the future counts as just now.
    let elapsed = (now - last_sent).to_std().unwrap_or(Duration::ZERO);
    interval.saturating_sub(elapsed)
}
