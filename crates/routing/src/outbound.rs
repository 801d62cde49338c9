use {async_trait::async_trait, ombud_common::types::ContentPayload};

/// Outbound message dispatcher — the seam to the chat platform.
///
/// Every method may fail with a transport error; the router treats such
/// failures as reportable and non-fatal, and never rolls back an already
/// persisted message because delivery failed.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn send_video(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn send_voice(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn send_document(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()>;

    /// Single dispatch point for a full payload, so forwarding sites don't
    /// re-branch on content type.
    async fn send_payload(&self, chat_id: i64, payload: &ContentPayload) -> anyhow::Result<()> {
        match payload {
            ContentPayload::Text { text } => self.send_text(chat_id, text).await,
            ContentPayload::Photo { file_id, caption } => {
                self.send_photo(chat_id, file_id, caption.as_deref()).await
            },
            ContentPayload::Video { file_id, caption } => {
                self.send_video(chat_id, file_id, caption.as_deref()).await
            },
            ContentPayload::Voice { file_id, caption } => {
                self.send_voice(chat_id, file_id, caption.as_deref()).await
            },
            ContentPayload::Document { file_id, caption } => {
                self.send_document(chat_id, file_id, caption.as_deref())
                    .await
            },
        }
    }
}
