use {
    async_trait::async_trait,
    teloxide::{
        payloads::{SendDocumentSetters, SendPhotoSetters, SendVideoSetters, SendVoiceSetters},
        prelude::*,
        types::{ChatId, InputFile},
    },
};

use ombud_routing::Outbound;

/// [`Outbound`] implementation backed by the Telegram Bot API.
///
/// Media is re-sent by file id, so relaying never moves the bytes through
/// this process.
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Outbound for TelegramOutbound {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut req = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::file_id(file_id));
        if let Some(caption) = caption {
            req = req.caption(caption);
        }
        req.await?;
        Ok(())
    }

    async fn send_video(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut req = self
            .bot
            .send_video(ChatId(chat_id), InputFile::file_id(file_id));
        if let Some(caption) = caption {
            req = req.caption(caption);
        }
        req.await?;
        Ok(())
    }

    async fn send_voice(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut req = self
            .bot
            .send_voice(ChatId(chat_id), InputFile::file_id(file_id));
        if let Some(caption) = caption {
            req = req.caption(caption);
        }
        req.await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut req = self
            .bot
            .send_document(ChatId(chat_id), InputFile::file_id(file_id));
        if let Some(caption) = caption {
            req = req.caption(caption);
        }
        req.await?;
        Ok(())
    }
}
