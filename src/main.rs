use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use menucast::app::App;
use menucast::bot::{callback_handler, command_handler, message_handler, Command};
use menucast::config::Settings;
use menucast::transport::{TelegramTransport, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Menucast Telegram Bot");

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;

    // Initialize the bot and build the application context
    let bot = Bot::new(settings.bot_token.clone());
    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(bot.clone()));
    let app = Arc::new(App::build(settings, transport)?);

    info!("Application context built, starting dispatcher");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(command_handler),
                )
                .branch(dptree::endpoint(message_handler)),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
