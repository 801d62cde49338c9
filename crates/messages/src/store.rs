use sqlx::SqlitePool;

use {
    crate::Result,
    ombud_common::{now_ms, types::ContentPayload},
};

/// One logged relay message, inbound or outbound.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: i64,
    pub user_id: i64,
    pub from_admin: bool,
    pub content_type: String,
    pub text: Option<String>,
    pub file_id: Option<String>,
    pub file_path: Option<String>,
    pub seen_by_admin: bool,
    pub created_at: i64,
}

const SELECT_MESSAGE: &str = "SELECT id, user_id, from_admin, content_type, text, \
     file_id, file_path, seen_by_admin, created_at FROM messages";

/// SQLite-backed per-user message log.
#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id       INTEGER NOT NULL,
                from_admin    INTEGER NOT NULL DEFAULT 0,
                content_type  TEXT    NOT NULL,
                text          TEXT,
                file_id       TEXT,
                file_path     TEXT,
                seen_by_admin INTEGER NOT NULL DEFAULT 0,
                created_at    INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_user_seen
             ON messages (user_id, from_admin, seen_by_admin)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Log an inbound user message. Returns the row id so the caller can
    /// flip `seen_by_admin` if the message is delivered live.
    pub async fn record_inbound(
        &self,
        user_id: i64,
        payload: &ContentPayload,
        media_path: Option<&str>,
    ) -> Result<i64> {
        self.record(user_id, false, payload, media_path, false).await
    }

    /// Log an admin-originated message. Outbound messages are born seen.
    pub async fn record_outbound(&self, user_id: i64, payload: &ContentPayload) -> Result<i64> {
        self.record(user_id, true, payload, None, true).await
    }

    async fn record(
        &self,
        user_id: i64,
        from_admin: bool,
        payload: &ContentPayload,
        media_path: Option<&str>,
        seen: bool,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO messages
             (user_id, from_admin, content_type, text, file_id, file_path, seen_by_admin, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(from_admin)
        .bind(payload.content_type())
        .bind(payload.body())
        .bind(payload.file_id())
        .bind(media_path)
        .bind(seen)
        .bind(now_ms())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Mark a single message as seen (live delivery).
    pub async fn mark_seen(&self, message_id: i64) -> Result<()> {
        sqlx::query("UPDATE messages SET seen_by_admin = 1 WHERE id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark every unseen inbound message from one user as seen (session
    /// start / backlog drain). Returns how many rows flipped.
    pub async fn mark_all_seen(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET seen_by_admin = 1
             WHERE user_id = ? AND from_admin = 0 AND seen_by_admin = 0",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn unseen_count(&self, user_id: i64) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages
             WHERE user_id = ? AND from_admin = 0 AND seen_by_admin = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    /// One page of a user's history, newest first, plus the total count.
    pub async fn history_page(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<MessageRecord>, i64)> {
        let offset = (page.max(1) - 1) * per_page;
        let messages = sqlx::query_as::<_, MessageRecord>(&format!(
            "{SELECT_MESSAGE} WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((messages, total))
    }

    /// Delete one user's history. Explicit admin purge only.
    pub async fn purge_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete all relay history.
    pub async fn purge_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> MessageStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        MessageStore::init(&pool).await.unwrap();
        MessageStore::new(pool)
    }

    #[tokio::test]
    async fn inbound_starts_unseen_outbound_starts_seen() {
        let store = test_store().await;

        store
            .record_inbound(1, &ContentPayload::text("hi"), None)
            .await
            .unwrap();
        store
            .record_outbound(1, &ContentPayload::text("hello back"))
            .await
            .unwrap();

        assert_eq!(store.unseen_count(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mark_seen_single_and_bulk() {
        let store = test_store().await;

        let id = store
            .record_inbound(1, &ContentPayload::text("a"), None)
            .await
            .unwrap();
        store
            .record_inbound(1, &ContentPayload::text("b"), None)
            .await
            .unwrap();
        store
            .record_inbound(2, &ContentPayload::text("c"), None)
            .await
            .unwrap();

        store.mark_seen(id).await.unwrap();
        assert_eq!(store.unseen_count(1).await.unwrap(), 1);

        let drained = store.mark_all_seen(1).await.unwrap();
        assert_eq!(drained, 1);
        assert_eq!(store.unseen_count(1).await.unwrap(), 0);
        // Other users untouched.
        assert_eq!(store.unseen_count(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn media_fields_are_persisted() {
        let store = test_store().await;

        let payload = ContentPayload::Photo {
            file_id: "f123".into(),
            caption: Some("receipt".into()),
        };
        store
            .record_inbound(1, &payload, Some("uploads/f123.jpg"))
            .await
            .unwrap();

        let (page, total) = store.history_page(1, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].content_type, "photo");
        assert_eq!(page[0].text.as_deref(), Some("receipt"));
        assert_eq!(page[0].file_id.as_deref(), Some("f123"));
        assert_eq!(page[0].file_path.as_deref(), Some("uploads/f123.jpg"));
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let store = test_store().await;

        for i in 0..5 {
            store
                .record_inbound(1, &ContentPayload::text(format!("m{i}")), None)
                .await
                .unwrap();
        }

        let (page, total) = store.history_page(1, 1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page[0].text.as_deref(), Some("m4"));
        assert_eq!(page[1].text.as_deref(), Some("m3"));
    }

    #[tokio::test]
    async fn purge_is_scoped() {
        let store = test_store().await;

        store
            .record_inbound(1, &ContentPayload::text("a"), None)
            .await
            .unwrap();
        store
            .record_inbound(2, &ContentPayload::text("b"), None)
            .await
            .unwrap();

        assert_eq!(store.purge_user(1).await.unwrap(), 1);
        let (_, total) = store.history_page(2, 1, 10).await.unwrap();
        assert_eq!(total, 1);

        assert_eq!(store.purge_all().await.unwrap(), 1);
    }
}
