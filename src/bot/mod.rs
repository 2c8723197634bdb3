//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `message_handler`: Handles incoming text and photo messages
//! - `command_handler`: Handles the slash commands
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `navigation`: Renders menu payloads onto the chat surface
//! - `broadcast`: The broadcast conversation and fan-out engine

pub mod broadcast;
pub mod callback_handler;
pub mod command_handler;
pub mod message_handler;
pub mod navigation;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use command_handler::{command_handler, Command};
pub use message_handler::message_handler;
