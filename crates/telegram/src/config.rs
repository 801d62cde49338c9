use std::path::PathBuf;

use secrecy::{ExposeSecret, Secret};

/// Connection settings for the relay bot.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: Secret<String>,

    /// Directory where inbound media is stored.
    pub upload_dir: PathBuf,
}

impl TelegramConfig {
    /// Build a bot with a client timeout longer than the long-polling
    /// timeout (30s) so the HTTP client doesn't abort the request before
    /// Telegram responds.
    pub fn bot(&self) -> anyhow::Result<teloxide::Bot> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(std::time::Duration::from_secs(45))
            .build()?;
        Ok(teloxide::Bot::with_client(
            self.token.expose_secret(),
            client,
        ))
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("upload_dir", &self.upload_dir)
            .finish()
    }
}
