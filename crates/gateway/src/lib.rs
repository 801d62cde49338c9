//! Webhook intake for ombud.
//!
//! An axum server exposing a health route and a secret-bearing Telegram
//! webhook route. Webhook updates flow through the same handler as the
//! polling loop, so the two intake modes cannot drift apart.

pub mod config;
pub mod server;

pub use {
    config::ServiceConfig,
    server::{AppState, app, register_webhook, serve},
};
