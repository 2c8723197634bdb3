//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error};

use crate::app::App;
use crate::bot::broadcast::{BroadcastOrigin, Sender};
use crate::bot::navigation::Surface;
use crate::stats::{resolve_scroll, Scroll, ScrollOutcome};
use crate::transport::TransportError;

const FIRST_PAGE_NOTICE: &str = "You're on the first page 🏠";
const NO_MORE_ENTRIES_NOTICE: &str = "No more entries 😢";

/// Route a button press: broadcast conversation actions, statistics
/// pagination, or ordinary menu navigation.
pub async fn callback_handler(bot: Bot, q: CallbackQuery, app: Arc<App>) -> Result<()> {
    let data = q.data.clone().unwrap_or_default();
    debug!(user_id = %q.from.id, callback = %data, "received callback query");

    let Some(message) = &q.message else {
        // Nothing to edit; just clear the button's loading state.
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let surface = Surface {
        chat: message.chat().id,
        message: message.id(),
        has_text: message
            .regular_message()
            .and_then(|m| m.text())
            .is_some(),
    };
    let current_text = message
        .regular_message()
        .and_then(|m| m.text())
        .unwrap_or_default()
        .to_string();

    app.store
        .add_or_reactivate(&surface.chat.0.to_string())
        .await?;
    if app.catalog.stats.iter().any(|tracked| tracked == &data) {
        app.store.increment_button(&data).await?;
    }

    let is_admin = app.settings.is_admin(surface.chat);
    let mut notice: Option<&str> = None;

    match data.as_str() {
        "broadcast" if is_admin => {
            if let Some(broadcaster) = &app.broadcaster {
                broadcaster.begin(BroadcastOrigin::Callback(surface)).await?;
            }
        }
        "cancel_broadcast" => {
            if let Some(broadcaster) = &app.broadcaster {
                broadcaster.cancel(surface.chat, surface.message).await?;
            }
        }
        "skip_pictures" => {
            if let Some(broadcaster) = &app.broadcaster {
                broadcaster.skip_media(surface.chat).await?;
            }
        }
        "confirm_broadcast" => {
            if let Some(broadcaster) = &app.broadcaster {
                let sender = Sender {
                    first_name: q.from.first_name.clone(),
                    username: q.from.username.clone(),
                };
                broadcaster.confirm(surface.chat, &sender).await?;
            }
        }
        "stat" => {
            if let Some(stats) = &app.stats {
                let pages = Arc::new(stats.compute_pages().await?);
                app.sessions
                    .cache_stat_pages(surface.chat, Arc::clone(&pages));
                match app
                    .transport
                    .edit_text(surface.chat, surface.message, &pages[0], stats.keyboard())
                    .await
                {
                    Ok(_) => {}
                    Err(TransportError::Stale(_)) => notice = Some(FIRST_PAGE_NOTICE),
                    Err(err) => return Err(err.into()),
                }
            }
        }
        scroll if scroll.starts_with("stat_") => {
            if let Some(stats) = &app.stats {
                let direction = if scroll.ends_with("forward") {
                    Scroll::Forward
                } else {
                    Scroll::Backward
                };

                let pages = match app.sessions.stat_pages(surface.chat) {
                    Some(pages) => pages,
                    None => {
                        let pages = Arc::new(stats.compute_pages().await?);
                        app.sessions
                            .cache_stat_pages(surface.chat, Arc::clone(&pages));
                        pages
                    }
                };

                match resolve_scroll(&pages, &current_text, direction) {
                    ScrollOutcome::Page(index) => {
                        app.transport
                            .edit_text(
                                surface.chat,
                                surface.message,
                                &pages[index],
                                stats.keyboard(),
                            )
                            .await?;
                    }
                    ScrollOutcome::NoMoreEntries => notice = Some(NO_MORE_ENTRIES_NOTICE),
                    ScrollOutcome::NotInCache => {
                        // Stale surface: fall back to the first page; if the
                        // surface already shows it, tell the user so.
                        match app
                            .transport
                            .edit_text(surface.chat, surface.message, &pages[0], stats.keyboard())
                            .await
                        {
                            Ok(_) => {}
                            Err(TransportError::Stale(_)) => notice = Some(FIRST_PAGE_NOTICE),
                            Err(err) => return Err(err.into()),
                        }
                    }
                }
            }
        }
        selection => {
            match app.navigator.route(surface, selection, None).await {
                Ok(_) => {}
                // Pressing the currently shown menu again changes nothing.
                Err(TransportError::Stale(_)) => {}
                Err(err) => {
                    error!(user_id = %q.from.id, error = %err, "navigation edit failed");
                    return Err(err.into());
                }
            }
        }
    }

    // Answer the callback query to remove the loading state, attaching any
    // transient notice.
    let mut answer = bot.answer_callback_query(q.id);
    if let Some(text) = notice {
        answer = answer.text(text);
    }
    answer.await?;

    Ok(())
}
