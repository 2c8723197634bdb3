//! # Transport Module
//!
//! Seam between the bot logic and the Telegram Bot API. The [`Transport`]
//! trait carries exactly the message primitives the engines need, and
//! [`TransportError`] folds the transport's failure modes into the three
//! cases the rest of the code distinguishes.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, FileId, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaPhoto, MessageId,
    ParseMode,
};
use teloxide::{ApiError, RequestError};

/// Failure modes of a transport operation
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The transport asked us to back off for the given duration
    RateLimited(Duration),
    /// The edit/delete target is gone or the edit changed nothing
    Stale(String),
    /// The recipient is unreachable or the request failed outright
    Delivery(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::RateLimited(wait) => {
                write!(f, "rate limited, retry after {}s", wait.as_secs())
            }
            TransportError::Stale(msg) => write!(f, "stale edit target: {msg}"),
            TransportError::Delivery(msg) => write!(f, "delivery failed: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<RequestError> for TransportError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RetryAfter(wait) => TransportError::RateLimited(wait.duration()),
            RequestError::Api(
                api @ (ApiError::MessageNotModified
                | ApiError::MessageToEditNotFound
                | ApiError::MessageToDeleteNotFound
                | ApiError::MessageCantBeDeleted
                | ApiError::MessageIdInvalid),
            ) => TransportError::Stale(api.to_string()),
            other => TransportError::Delivery(other.to_string()),
        }
    }
}

/// A reference to a photo: a catalog asset on disk or an already-uploaded
/// Telegram file.
#[derive(Debug, Clone)]
pub enum MediaRef {
    Path(PathBuf),
    FileId(FileId),
}

impl MediaRef {
    fn input_file(&self) -> InputFile {
        match self {
            MediaRef::Path(path) => InputFile::file(path.clone()),
            MediaRef::FileId(id) => InputFile::file_id(id.clone()),
        }
    }
}

/// The chat-surface primitives consumed by the engines. Object safe so the
/// tests can substitute a scripted implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, TransportError>;

    async fn send_photo(
        &self,
        chat: ChatId,
        media: &MediaRef,
        caption: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, TransportError>;

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, TransportError>;

    async fn edit_caption(
        &self,
        chat: ChatId,
        message: MessageId,
        caption: &str,
    ) -> Result<MessageId, TransportError>;

    async fn edit_media(
        &self,
        chat: ChatId,
        message: MessageId,
        media: &MediaRef,
        caption: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, TransportError>;

    async fn delete_message(&self, chat: ChatId, message: MessageId)
        -> Result<(), TransportError>;
}

/// Production transport over the Telegram Bot API. All outgoing text and
/// captions use HTML markup.
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, TransportError> {
        let mut request = self
            .bot
            .send_message(chat, text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        let message = request.await?;
        Ok(message.id)
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        media: &MediaRef,
        caption: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, TransportError> {
        let mut request = self
            .bot
            .send_photo(chat, media.input_file())
            .caption(caption)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        let message = request.await?;
        Ok(message.id)
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, TransportError> {
        let mut request = self
            .bot
            .edit_message_text(chat, message, text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        let message = request.await?;
        Ok(message.id)
    }

    async fn edit_caption(
        &self,
        chat: ChatId,
        message: MessageId,
        caption: &str,
    ) -> Result<MessageId, TransportError> {
        let message = self
            .bot
            .edit_message_caption(chat, message)
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(message.id)
    }

    async fn edit_media(
        &self,
        chat: ChatId,
        message: MessageId,
        media: &MediaRef,
        caption: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, TransportError> {
        let mut photo = InputMediaPhoto::new(media.input_file());
        photo.caption = Some(caption.to_string());
        photo.parse_mode = Some(ParseMode::Html);

        let mut request = self
            .bot
            .edit_message_media(chat, message, InputMedia::Photo(photo));
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        let message = request.await?;
        Ok(message.id)
    }

    async fn delete_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> Result<(), TransportError> {
        self.bot.delete_message(chat, message).await?;
        Ok(())
    }
}
