//! # Menucast Telegram Bot
//!
//! A data-driven Telegram bot backend: navigable inline-keyboard menus built
//! from JSON definitions, per-user activity tracking, paginated usage
//! statistics for an administrator, and mass broadcasts with bounded
//! concurrency and rate-limit backoff.

pub mod app;
pub mod bot;
pub mod catalog;
pub mod config;
pub mod db;
pub mod menu;
pub mod session;
pub mod stats;
pub mod transport;
