//! # Configuration Module
//!
//! Typed runtime settings, read once from the environment at startup and
//! passed by reference to every component that needs them.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use teloxide::types::ChatId;

// Constants for bot configuration
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;
pub const DEFAULT_BROADCAST_CONCURRENCY: usize = 20;

/// Menu-key suffixes that never receive a synthesized back button.
pub const DEFAULT_BACK_EXCLUSIONS: [&str; 3] = ["start", "broadcast", "stat"];

/// Runtime settings for the bot process
#[derive(Debug, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub bot_token: String,
    /// Directory holding `json/` documents and `images/` assets
    pub data_dir: PathBuf,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Chat allowed to run `/mail`, `/stat` and `/db`; admin features are
    /// disabled when unset
    pub admin_chat_id: Option<ChatId>,
    /// Reply for messages the bot does not otherwise understand
    pub default_answer: Option<String>,
    /// Menu-key suffixes excluded from back-button synthesis
    pub back_exclusions: Vec<String>,
    /// Fixed UTC offset used for calendar-period bucketing
    pub utc_offset: FixedOffset,
    /// Maximum concurrently in-flight broadcast deliveries
    pub broadcast_concurrency: usize,
}

impl Settings {
    /// Read settings from the environment (after `dotenv` has run).
    pub fn from_env() -> Result<Self> {
        let bot_token =
            env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;

        let data_dir =
            PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()));

        let database_path = match env::var("DATABASE_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => data_dir.join("bot.db"),
        };

        let admin_chat_id = match env::var("ADMIN_CHAT_ID") {
            Ok(raw) => Some(ChatId(
                raw.parse::<i64>()
                    .context("ADMIN_CHAT_ID must be a numeric chat identifier")?,
            )),
            Err(_) => None,
        };

        let default_answer = env::var("DEFAULT_ANSWER").ok().filter(|s| !s.is_empty());

        let offset_hours = match env::var("UTC_OFFSET_HOURS") {
            Ok(raw) => raw
                .parse::<i32>()
                .context("UTC_OFFSET_HOURS must be an integer")?,
            Err(_) => DEFAULT_UTC_OFFSET_HOURS,
        };
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600)
            .context("UTC_OFFSET_HOURS is out of range")?;

        let broadcast_concurrency = match env::var("BROADCAST_CONCURRENCY") {
            Ok(raw) => raw
                .parse::<usize>()
                .context("BROADCAST_CONCURRENCY must be a positive integer")?,
            Err(_) => DEFAULT_BROADCAST_CONCURRENCY,
        };

        Ok(Self {
            bot_token,
            data_dir,
            database_path,
            admin_chat_id,
            default_answer,
            back_exclusions: DEFAULT_BACK_EXCLUSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            utc_offset,
            broadcast_concurrency,
        })
    }

    /// Whether the given chat is the configured administrator.
    pub fn is_admin(&self, chat: ChatId) -> bool {
        self.admin_chat_id == Some(chat)
    }
}
