//! Command Handler module for the bot's slash commands

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::app::App;
use crate::bot::broadcast::BroadcastOrigin;
use crate::menu::START_PAYLOAD_KEY;
use crate::transport::TransportError;

const DB_EXPORT_CAPTION: &str = "Database exported <b>successfully</b> ✅";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Open the start menu
    Start,
    /// Start a broadcast draft (admin)
    Mail,
    /// Show usage statistics (admin)
    Stat,
    /// Export the database file (admin)
    Db,
}

pub async fn command_handler(bot: Bot, msg: Message, cmd: Command, app: Arc<App>) -> Result<()> {
    let chat = msg.chat.id;
    app.store.add_or_reactivate(&chat.0.to_string()).await?;

    let is_admin = app.settings.is_admin(chat);
    match cmd {
        Command::Start => {
            app.navigator.send_to(chat, START_PAYLOAD_KEY).await?;
        }
        Command::Mail if is_admin => {
            if let Some(broadcaster) = &app.broadcaster {
                broadcaster.begin(BroadcastOrigin::Command(chat)).await?;
            }
        }
        Command::Stat if is_admin => {
            if let Some(stats) = &app.stats {
                // Keep the admin chat clean: the command message goes away
                // and the report arrives as a fresh surface.
                match app.transport.delete_message(chat, msg.id).await {
                    Ok(()) | Err(TransportError::Stale(_)) => {}
                    Err(err) => warn!(chat = chat.0, error = %err, "failed to drop /stat message"),
                }

                let pages = Arc::new(stats.compute_pages().await?);
                app.sessions.cache_stat_pages(chat, Arc::clone(&pages));
                app.transport
                    .send_text(chat, &pages[0], stats.keyboard())
                    .await?;
            }
        }
        Command::Db if is_admin => {
            match app.transport.delete_message(chat, msg.id).await {
                Ok(()) | Err(TransportError::Stale(_)) => {}
                Err(err) => warn!(chat = chat.0, error = %err, "failed to drop /db message"),
            }

            info!(chat = chat.0, "exporting database file");
            bot.send_document(chat, InputFile::file(app.settings.database_path.clone()))
                .caption(DB_EXPORT_CAPTION)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        // Admin commands from anyone else fall through to the default reply.
        _ => {
            if let Some(answer) = &app.settings.default_answer {
                app.transport.send_text(chat, answer, None).await?;
            }
        }
    }

    Ok(())
}
