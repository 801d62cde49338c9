//! Telegram transport for ombud.
//!
//! Uses the teloxide library to receive updates (manual long polling or a
//! webhook feed) and to send relay traffic back out, re-sending media by
//! file id so bytes are never re-uploaded.

pub mod bot;
pub mod config;
pub mod error;
pub mod inbound;
pub mod outbound;

pub use {
    bot::{process_update, start_polling},
    config::TelegramConfig,
    error::{Error, Result},
    outbound::TelegramOutbound,
};
