use std::path::PathBuf;

use {
    anyhow::Context,
    rand::{Rng, distr::Alphanumeric},
    secrecy::Secret,
};

/// Service configuration, read from the environment once at startup.
pub struct ServiceConfig {
    /// Bot token from @BotFather (`TELEGRAM_TOKEN`).
    pub token: Secret<String>,

    /// Admin Telegram user ids (`ADMIN_ID`, comma-separated).
    pub admin_ids: Vec<i64>,

    /// SQLite connection string (`DATABASE_URL`).
    pub database_url: String,

    /// Public base URL (`WEBHOOK_URL`); presence selects webhook mode over
    /// long polling.
    pub webhook_url: Option<String>,

    /// Path secret for the webhook route (`WEBHOOK_SECRET`); generated
    /// fresh per start when unset.
    pub webhook_secret: String,

    /// Directory for inbound media (`UPLOAD_PATH`).
    pub upload_dir: PathBuf,

    /// Listen port for the webhook server (`PORT`).
    pub port: u16,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let token = std::env::var("TELEGRAM_TOKEN").context("TELEGRAM_TOKEN is required")?;

        let admin_ids = std::env::var("ADMIN_ID")
            .context("ADMIN_ID is required (comma-separated Telegram user ids)")?
            .split(',')
            .map(|part| part.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .context("ADMIN_ID must be comma-separated integers")?;

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://ombud.db".to_string());

        let webhook_url = std::env::var("WEBHOOK_URL")
            .ok()
            .filter(|url| !url.is_empty());
        let webhook_secret = std::env::var("WEBHOOK_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
            .unwrap_or_else(random_secret);

        let upload_dir =
            PathBuf::from(std::env::var("UPLOAD_PATH").unwrap_or_else(|_| "./uploads".to_string()));

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a number")?,
            Err(_) => 5000,
        };

        Ok(Self {
            token: Secret::new(token),
            admin_ids,
            database_url,
            webhook_url,
            webhook_secret,
            upload_dir,
            port,
        })
    }
}

fn random_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("token", &"[REDACTED]")
            .field("admin_ids", &self.admin_ids)
            .field("database_url", &self.database_url)
            .field("webhook_url", &self.webhook_url)
            .field("webhook_secret", &"[REDACTED]")
            .field("upload_dir", &self.upload_dir)
            .field("port", &self.port)
            .finish()
    }
}
