use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    application::services::messenger::MessengerClient,
    domain::{
        models::{DeliveryError, DeliveryOutcome, DispatchUnit, MessengerType},
        value_objects::RateSpec,
    },
};

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub base_url: String,
    pub chat_limit: RateSpec,
    pub global_limit: RateSpec,
}

impl TelegramConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.telegram.org";

    /// Telegram's published bot limits.
    pub fn chat_limit_default() -> RateSpec {
        RateSpec::per_second(1)
    }

    pub fn global_limit_default() -> RateSpec {
        RateSpec::per_second(30)
    }
}

pub struct TelegramClient {
    http: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> anyhow::Result<Arc<dyn MessengerClient>> {
        let http = Client::builder()
            .user_agent("notification-dispatch/telegram")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Arc::new(Self { http, config }) as Arc<dyn MessengerClient>)
    }

    fn build_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.base_url, self.config.bot_token, method)
    }
}

#[async_trait]
impl MessengerClient for TelegramClient {
    fn messenger(&self) -> MessengerType {
        MessengerType::Telegram
    }

    fn chat_limit(&self) -> RateSpec {
        self.config.chat_limit
    }

    fn global_limit(&self) -> RateSpec {
        self.config.global_limit
    }

    async fn send(&self, unit: &DispatchUnit) -> DeliveryOutcome {
        let response = self
            .http
            .post(self.build_url("sendMessage"))
            .json(&json!({
                "chat_id": unit.chat_reference,
                "text": unit.text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => return internal_error(err),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return internal_error(err),
        };

        let outcome = outcome_from_response(status, &body);
        debug!(message_id = %unit.message_id, status = status.as_u16(), "telegram sendMessage");
        outcome
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    error_code: Option<i32>,
    description: Option<String>,
}

fn outcome_from_response(status: StatusCode, body: &str) -> DeliveryOutcome {
    let payload = serde_json::from_str::<TelegramResponse>(body).ok();

    if status.is_success() && payload.as_ref().is_some_and(|p| p.ok) {
        return DeliveryOutcome::Delivered { sent_at: Utc::now() };
    }

    let code = payload
        .as_ref()
        .and_then(|p| p.error_code)
        .unwrap_or(i32::from(status.as_u16()));
    let message = payload
        .and_then(|p| p.description)
        .unwrap_or_else(|| body.trim().to_string());

    DeliveryOutcome::Failed {
        error: DeliveryError { code, message },
    }
}

fn internal_error(err: reqwest::Error) -> DeliveryOutcome {
    DeliveryOutcome::Failed {
        error: DeliveryError {
            code: 500,
            message: format!("Internal error: {err}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_is_delivered() {
        let outcome = outcome_from_response(StatusCode::OK, r#"{"ok":true,"result":{"message_id":1}}"#);

        assert!(matches!(outcome, DeliveryOutcome::Delivered { .. }));
    }

    #[test]
    fn api_error_keeps_code_and_description() {
        let outcome = outcome_from_response(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 5"}"#,
        );

        assert_eq!(
            outcome,
            DeliveryOutcome::Failed {
                error: DeliveryError {
                    code: 429,
                    message: "Too Many Requests: retry after 5".to_string(),
                },
            }
        );
    }

    #[test]
    fn unparseable_body_falls_back_to_http_status() {
        let outcome = outcome_from_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");

        assert_eq!(
            outcome,
            DeliveryOutcome::Failed {
                error: DeliveryError {
                    code: 502,
                    message: "<html>bad gateway</html>".to_string(),
                },
            }
        );
    }

    #[test]
    fn success_status_without_ok_flag_is_a_failure() {
        let outcome = outcome_from_response(StatusCode::OK, "not json");

        assert!(matches!(outcome, DeliveryOutcome::Failed { error } if error.code == 200));
    }
}
