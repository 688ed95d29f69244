mod auto_delete;
mod bot;
mod commands;
mod components;
mod config;
mod error;
mod health;
mod logging;
mod lowball;
mod moderation;
mod platform;
mod roles;

use std::sync::Arc;

use futures::TryFutureExt;

use crate::{config::Config, error::BotError, health::BotStatus};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let config = Arc::new(Config::from_env()?);
    let status = BotStatus::default();

    if let Some(url) = config.keep_alive_url.clone() {
        tokio::spawn(health::keep_alive(url));
        tracing::info!("Keep-alive mechanism started");
    }

    let bot = bot::run_bot(Arc::clone(&config), status.clone()).map_err(BotError::from);
    let server = health::serve(config.port, status);

    futures::future::try_join(bot, server).await?;
    Ok(())
}
