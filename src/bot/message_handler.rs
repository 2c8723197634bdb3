//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::debug;

use crate::app::App;
use crate::session::BroadcastState;

/// Handle a non-command message: keep the sender's activity fresh, feed the
/// admin's broadcast conversation when one is in progress, otherwise fall
/// back to the configured default answer.
pub async fn message_handler(bot: Bot, msg: Message, app: Arc<App>) -> Result<()> {
    let chat = msg.chat.id;
    app.store.add_or_reactivate(&chat.0.to_string()).await?;

    if app.settings.is_admin(chat) {
        if let Some(broadcaster) = &app.broadcaster {
            match app.sessions.broadcast_state(chat) {
                BroadcastState::CollectingText { .. } => {
                    if let Some(body) = msg.text() {
                        return broadcaster.collect_text(chat, msg.id, body).await;
                    }
                    debug!(chat = chat.0, "non-text message while collecting body, ignoring");
                    return Ok(());
                }
                BroadcastState::CollectingMedia { .. } => {
                    let photo = msg
                        .photo()
                        .and_then(|sizes| sizes.first())
                        .map(|size| size.file.id.clone());
                    return broadcaster.collect_media(chat, msg.id, photo).await;
                }
                _ => {}
            }
        }
    }

    if let Some(answer) = &app.settings.default_answer {
        app.transport.send_text(chat, answer, None).await?;
    }

    Ok(())
}
