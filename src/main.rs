use std::sync::Arc;

use anyhow::Context;
use notification_dispatch::{
    application::{
        services::{
            clock::SystemClock, messenger::MessengerGateway, rate_limiter::SendIntervals,
        },
        usecases::{
            create_messages::CreateMessagesUseCase,
            send_messages::{SendMessagesConfig, SendMessagesUseCase},
        },
    },
    infrastructure::{
        messaging::telegram::TelegramClient,
        repositories::postgres::{PostgresMessageRepository, PostgresProductRepository},
    },
};
use sqlx::postgres::PgPoolOptions;
use tokio::{main, time::MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

mod config;

#[main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::try_parse()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let gateway = MessengerGateway::new(vec![TelegramClient::new(config.telegram.clone())?]);
    for messenger in gateway.messengers() {
        if let Some(client) = gateway.get(messenger) {
            let intervals = SendIntervals::for_client(client.as_ref())?;
            info!(%messenger, chat = ?intervals.chat, global = ?intervals.global, "messenger limits");
        }
    }

    let create_messages = CreateMessagesUseCase::new(PostgresProductRepository::new(pool.clone()));
    let send_messages = SendMessagesUseCase::new(
        PostgresMessageRepository::new(pool.clone()),
        gateway.clone(),
        Arc::new(SystemClock),
        SendMessagesConfig {
            max_retries: config.max_retries_per_message,
        },
    );

    let mut ticker = tokio::time::interval(config.tasks_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;

        if let Err(err) = create_messages.execute().await {
            error!("failed to create messages: {err:?}");
        }

        for messenger in gateway.messengers() {
            if let Err(err) = send_messages.execute(messenger).await {
                error!(%messenger, "failed to send messages: {err:?}");
            }
        }
    }
}
