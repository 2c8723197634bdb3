//! Navigation Handler module: routes a menu selection to its registered
//! payload and renders it onto the user's chat surface, keeping exactly one
//! visible message per conversation.

use std::collections::HashMap;
use std::sync::Arc;

use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId};
use tracing::debug;

use crate::menu::{MessagePayload, PayloadBody};
use crate::transport::{Transport, TransportError};

/// The message currently representing the menu in a chat.
#[derive(Debug, Clone, Copy)]
pub struct Surface {
    pub chat: ChatId,
    pub message: MessageId,
    /// Whether the message shows text (in-place text edits are possible)
    pub has_text: bool,
}

/// Caller-supplied overrides, shallow-merged over the looked-up payload.
#[derive(Debug, Clone, Default)]
pub struct PayloadPatch {
    pub body: Option<PayloadBody>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

pub struct Navigator {
    transport: Arc<dyn Transport>,
    payloads: HashMap<String, MessagePayload>,
    default_payload: MessagePayload,
}

impl Navigator {
    pub fn new(
        transport: Arc<dyn Transport>,
        payloads: HashMap<String, MessagePayload>,
        default_answer: Option<String>,
    ) -> Self {
        let default_payload = MessagePayload {
            body: PayloadBody::Text(default_answer.unwrap_or_default()),
            keyboard: None,
        };
        Self {
            transport,
            payloads,
            default_payload,
        }
    }

    fn payload(&self, selection: &str) -> &MessagePayload {
        self.payloads.get(selection).unwrap_or_else(|| {
            debug!(selection, "no payload registered, using default");
            &self.default_payload
        })
    }

    /// Render the payload registered for `selection` onto the surface,
    /// applying any overrides first. Returns the id of the message that now
    /// represents the menu.
    pub async fn route(
        &self,
        surface: Surface,
        selection: &str,
        extra: Option<PayloadPatch>,
    ) -> Result<MessageId, TransportError> {
        let mut payload = self.payload(selection).clone();
        if let Some(patch) = extra {
            if let Some(body) = patch.body {
                payload.body = body;
            }
            if let Some(keyboard) = patch.keyboard {
                payload.keyboard = Some(keyboard);
            }
        }

        match &payload.body {
            PayloadBody::Media { media, caption } => {
                self.transport
                    .edit_media(
                        surface.chat,
                        surface.message,
                        media,
                        caption,
                        payload.keyboard.clone(),
                    )
                    .await
            }
            PayloadBody::Text(_) => self.render_text(surface, &payload).await,
        }
    }

    /// Edit the surface in place when it shows text; otherwise replace it
    /// with a fresh message and drop the old one. A missing delete target is
    /// not an error — the surface is already gone.
    pub async fn render_text(
        &self,
        surface: Surface,
        payload: &MessagePayload,
    ) -> Result<MessageId, TransportError> {
        let text = match &payload.body {
            PayloadBody::Text(text) => text.as_str(),
            PayloadBody::Media { caption, .. } => caption.as_str(),
        };

        if surface.has_text {
            return self
                .transport
                .edit_text(
                    surface.chat,
                    surface.message,
                    text,
                    payload.keyboard.clone(),
                )
                .await;
        }

        let replacement = self
            .transport
            .send_text(surface.chat, text, payload.keyboard.clone())
            .await?;
        match self
            .transport
            .delete_message(surface.chat, surface.message)
            .await
        {
            Ok(()) | Err(TransportError::Stale(_)) => {}
            Err(err) => return Err(err),
        }
        Ok(replacement)
    }

    /// Send the payload registered for `selection` as a fresh message
    /// (used for `/start`, where there is no surface to edit yet).
    pub async fn send_to(
        &self,
        chat: ChatId,
        selection: &str,
    ) -> Result<MessageId, TransportError> {
        let payload = self.payload(selection).clone();
        match &payload.body {
            PayloadBody::Media { media, caption } => {
                self.transport
                    .send_photo(chat, media, caption, payload.keyboard.clone())
                    .await
            }
            PayloadBody::Text(text) => {
                self.transport
                    .send_text(chat, text, payload.keyboard.clone())
                    .await
            }
        }
    }
}
