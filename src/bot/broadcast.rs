//! Broadcast Engine module: the admin conversation that assembles a
//! broadcast draft (body → optional picture → confirmation) and the bounded
//! fan-out that delivers it to every active recipient.
//!
//! Rate-limit signals suspend only the affected recipient's delivery and are
//! retried until they clear; any other delivery failure deactivates the
//! recipient and is counted, not retried. The fan-out joins every recipient
//! task before reporting, and cannot be cancelled once confirmed.

use std::sync::Arc;

use anyhow::Result;
use teloxide::types::{ChatId, FileId, InlineKeyboardMarkup, MessageId};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::catalog::fill;
use crate::db::ActivityStore;
use crate::menu::PayloadBody;
use crate::session::{BroadcastState, SessionStore};
use crate::transport::{MediaRef, Transport, TransportError};

use super::navigation::{Navigator, PayloadPatch, Surface};

const IN_PROGRESS_NOTICE: &str = "⏳ <b>Broadcast in progress…</b>";

/// Message templates driving the admin conversation, all keyed in the
/// catalog's `messages` document.
#[derive(Debug, Clone)]
pub struct BroadcastTexts {
    /// `broadcast`: control-message prompt, `{}` = active recipient count
    pub prompt: String,
    /// `broadcast_text`: body preview shown while waiting for a picture
    pub preview: String,
    /// `broadcast_result`: confirmation preview, `{}` = body
    pub result: String,
    /// `broadcast_end`: final report, `{}` = body, delivered, name, handle
    pub report: String,
}

/// Keyboards attached to the control message in each state, plus the one
/// carried by the mass messages themselves.
#[derive(Debug, Clone)]
pub struct BroadcastKeyboards {
    pub cancel: Option<InlineKeyboardMarkup>,
    pub edit: Option<InlineKeyboardMarkup>,
    pub confirm: Option<InlineKeyboardMarkup>,
    pub receive: Option<InlineKeyboardMarkup>,
}

/// Where the broadcast conversation was started from.
pub enum BroadcastOrigin {
    /// The `/mail` command: answer with a fresh control message
    Command(ChatId),
    /// The `broadcast` menu button: reuse the menu surface
    Callback(Surface),
}

/// The admin who confirmed the broadcast, for the final report.
#[derive(Debug, Clone)]
pub struct Sender {
    pub first_name: String,
    pub username: Option<String>,
}

/// What each recipient receives.
#[derive(Clone)]
pub struct BroadcastContent {
    pub body: String,
    pub media: Option<FileId>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

pub struct Broadcaster {
    transport: Arc<dyn Transport>,
    navigator: Arc<Navigator>,
    store: ActivityStore,
    sessions: SessionStore,
    texts: BroadcastTexts,
    keyboards: BroadcastKeyboards,
    concurrency: usize,
}

impl Broadcaster {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn Transport>,
        navigator: Arc<Navigator>,
        store: ActivityStore,
        sessions: SessionStore,
        texts: BroadcastTexts,
        keyboards: BroadcastKeyboards,
        concurrency: usize,
    ) -> Self {
        Self {
            transport,
            navigator,
            store,
            sessions,
            texts,
            keyboards,
            concurrency,
        }
    }

    /// `Idle → CollectingText`: drop any prior draft, show the prompt with
    /// the live recipient count and remember the control message.
    pub async fn begin(&self, origin: BroadcastOrigin) -> Result<()> {
        let chat = match &origin {
            BroadcastOrigin::Command(chat) => *chat,
            BroadcastOrigin::Callback(surface) => surface.chat,
        };
        self.sessions.clear_broadcast(chat);

        let counts = self.store.count_by_activity().await?;
        let prompt = fill(&self.texts.prompt, &[&counts.active.to_string()]);

        let control = match origin {
            BroadcastOrigin::Command(chat) => {
                self.transport
                    .send_text(chat, &prompt, self.keyboards.cancel.clone())
                    .await?
            }
            BroadcastOrigin::Callback(surface) => {
                self.navigator
                    .route(
                        surface,
                        "broadcast",
                        Some(PayloadPatch {
                            body: Some(PayloadBody::Text(prompt)),
                            keyboard: self.keyboards.cancel.clone(),
                        }),
                    )
                    .await?
            }
        };

        self.sessions
            .set_broadcast_state(chat, BroadcastState::CollectingText { control });
        info!(chat = chat.0, "broadcast draft started");
        Ok(())
    }

    /// `CollectingText → CollectingMedia`: store the body, delete the
    /// admin's message to keep the chat clean, show the preview.
    pub async fn collect_text(&self, chat: ChatId, inbound: MessageId, body: &str) -> Result<()> {
        let BroadcastState::CollectingText { control } = self.sessions.broadcast_state(chat)
        else {
            return Ok(());
        };

        self.discard_inbound(chat, inbound).await?;

        let preview = fill(&self.texts.preview, &[body]);
        self.transport
            .edit_text(chat, control, &preview, self.keyboards.edit.clone())
            .await?;

        self.sessions.set_broadcast_state(
            chat,
            BroadcastState::CollectingMedia {
                control,
                body: body.to_string(),
            },
        );
        Ok(())
    }

    /// `CollectingMedia → Confirming` on a picture; anything without one
    /// re-renders the prompt and stays put.
    pub async fn collect_media(
        &self,
        chat: ChatId,
        inbound: MessageId,
        photo: Option<FileId>,
    ) -> Result<()> {
        let BroadcastState::CollectingMedia { control, body } =
            self.sessions.broadcast_state(chat)
        else {
            return Ok(());
        };

        self.discard_inbound(chat, inbound).await?;

        let Some(media) = photo else {
            let preview = fill(&self.texts.preview, &[&body]);
            match self
                .transport
                .edit_text(chat, control, &preview, self.keyboards.edit.clone())
                .await
            {
                // The prompt is usually unchanged; that is the point.
                Ok(_) | Err(TransportError::Stale(_)) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        };

        let caption = fill(&self.texts.result, &[&body]);
        self.transport
            .edit_media(
                chat,
                control,
                &MediaRef::FileId(media.clone()),
                &caption,
                self.keyboards.confirm.clone(),
            )
            .await?;

        self.sessions.set_broadcast_state(
            chat,
            BroadcastState::Confirming {
                control,
                body,
                media: Some(media),
            },
        );
        Ok(())
    }

    /// `CollectingMedia → Confirming` without a picture.
    pub async fn skip_media(&self, chat: ChatId) -> Result<()> {
        let BroadcastState::CollectingMedia { control, body } =
            self.sessions.broadcast_state(chat)
        else {
            return Ok(());
        };

        let preview = fill(&self.texts.result, &[&body]);
        self.transport
            .edit_text(chat, control, &preview, self.keyboards.confirm.clone())
            .await?;

        self.sessions.set_broadcast_state(
            chat,
            BroadcastState::Confirming {
                control,
                body,
                media: None,
            },
        );
        Ok(())
    }

    /// Any state → `Idle`: abandon the draft and drop the control message.
    pub async fn cancel(&self, chat: ChatId, surface_message: MessageId) -> Result<()> {
        self.sessions.clear_broadcast(chat);
        match self.transport.delete_message(chat, surface_message).await {
            Ok(()) | Err(TransportError::Stale(_)) => {}
            Err(err) => return Err(err.into()),
        }
        info!(chat = chat.0, "broadcast draft cancelled");
        Ok(())
    }

    /// `Confirming → Sending → Idle`: snapshot the draft, run the fan-out
    /// and report the outcome on the control message.
    pub async fn confirm(&self, chat: ChatId, sender: &Sender) -> Result<()> {
        let BroadcastState::Confirming {
            control,
            body,
            media,
        } = self.sessions.broadcast_state(chat)
        else {
            return Ok(());
        };
        self.sessions.clear_broadcast(chat);

        let notice = match &media {
            Some(_) => {
                self.transport
                    .edit_caption(chat, control, IN_PROGRESS_NOTICE)
                    .await
            }
            None => {
                self.transport
                    .edit_text(chat, control, IN_PROGRESS_NOTICE, None)
                    .await
            }
        };
        match notice {
            Ok(_) | Err(TransportError::Stale(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let recipients = self.store.list_active().await?;
        info!(
            chat = chat.0,
            recipients = recipients.len(),
            with_media = media.is_some(),
            "broadcast fan-out starting"
        );

        let content = BroadcastContent {
            body: body.clone(),
            media: media.clone(),
            keyboard: self.keyboards.receive.clone(),
        };
        let delivered = fan_out(
            Arc::clone(&self.transport),
            self.store.clone(),
            recipients,
            content,
            self.concurrency,
        )
        .await;

        self.store.count_by_activity().await?;

        let report = fill(
            &self.texts.report,
            &[
                &body,
                &delivered.to_string(),
                &sender.first_name,
                sender.username.as_deref().unwrap_or_default(),
            ],
        );
        let edited = match &media {
            Some(_) => self.transport.edit_caption(chat, control, &report).await,
            None => self.transport.edit_text(chat, control, &report, None).await,
        };
        match edited {
            Err(TransportError::Stale(reason)) => {
                debug!(chat = chat.0, %reason, "control message gone, sending report fresh");
                self.transport.send_text(chat, &report, None).await?;
            }
            Ok(_) => {}
            Err(err) => return Err(err.into()),
        }

        info!(chat = chat.0, delivered, "broadcast finished");
        Ok(())
    }

    async fn discard_inbound(&self, chat: ChatId, inbound: MessageId) -> Result<()> {
        match self.transport.delete_message(chat, inbound).await {
            Ok(()) | Err(TransportError::Stale(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Deliver `content` to every recipient with at most `concurrency`
/// deliveries in flight, honoring per-recipient rate-limit waits. Returns
/// the number of successful deliveries after every task has terminated.
pub async fn fan_out(
    transport: Arc<dyn Transport>,
    store: ActivityStore,
    recipients: Vec<String>,
    content: BroadcastContent,
    concurrency: usize,
) -> usize {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(recipients.len());

    for user_id in recipients {
        let transport = Arc::clone(&transport);
        let store = store.clone();
        let semaphore = Arc::clone(&semaphore);
        let content = content.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return false,
            };
            deliver(transport.as_ref(), &store, &user_id, &content).await
        }));
    }

    let mut delivered = 0;
    for task in tasks {
        if matches!(task.await, Ok(true)) {
            delivered += 1;
        }
    }
    delivered
}

/// One recipient: retry through rate limits, deactivate on anything else.
async fn deliver(
    transport: &dyn Transport,
    store: &ActivityStore,
    user_id: &str,
    content: &BroadcastContent,
) -> bool {
    let chat = match user_id.parse::<i64>() {
        Ok(id) => ChatId(id),
        Err(_) => {
            warn!(user_id, "unparseable recipient id, deactivating");
            deactivate(store, user_id).await;
            return false;
        }
    };

    loop {
        let attempt = match &content.media {
            Some(media) => {
                transport
                    .send_photo(
                        chat,
                        &MediaRef::FileId(media.clone()),
                        &content.body,
                        content.keyboard.clone(),
                    )
                    .await
            }
            None => {
                transport
                    .send_text(chat, &content.body, content.keyboard.clone())
                    .await
            }
        };

        match attempt {
            Ok(_) => return true,
            Err(TransportError::RateLimited(wait)) => {
                debug!(user_id, wait_secs = wait.as_secs(), "rate limited, backing off");
                tokio::time::sleep(wait).await;
            }
            Err(err) => {
                warn!(user_id, error = %err, "delivery failed, deactivating recipient");
                deactivate(store, user_id).await;
                return false;
            }
        }
    }
}

async fn deactivate(store: &ActivityStore, user_id: &str) {
    if let Err(err) = store.set_active(user_id, false).await {
        warn!(user_id, error = %err, "failed to record deactivation");
    }
}
