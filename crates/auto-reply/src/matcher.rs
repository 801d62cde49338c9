use sqlx::SqlitePool;

use {crate::Result, ombud_common::now_ms};

/// One configured keyword → response pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AutoReply {
    pub id: i64,
    pub keyword: String,
    pub reply_text: String,
    pub reply_photo_id: Option<String>,
    pub created_at: i64,
}

const SELECT_REPLY: &str =
    "SELECT id, keyword, reply_text, reply_photo_id, created_at FROM auto_replies";

/// SQLite-backed keyword matcher and CRUD surface.
#[derive(Clone)]
pub struct AutoReplyStore {
    pool: SqlitePool,
}

impl AutoReplyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS auto_replies (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                keyword        TEXT    NOT NULL UNIQUE,
                reply_text     TEXT    NOT NULL,
                reply_photo_id TEXT,
                created_at     INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// First configured keyword contained (case-insensitively) in `text`.
    pub async fn find_match(&self, text: &str) -> Result<Option<AutoReply>> {
        let needle = text.to_lowercase();

        // Small table; scan in insertion order so the winner is stable.
        let replies = sqlx::query_as::<_, AutoReply>(&format!("{SELECT_REPLY} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;

        Ok(replies
            .into_iter()
            .find(|r| needle.contains(&r.keyword.to_lowercase())))
    }

    /// Insert or update by keyword. A new photo replaces the old one; an
    /// absent photo leaves any existing one in place.
    pub async fn upsert(
        &self,
        keyword: &str,
        reply_text: &str,
        reply_photo_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO auto_replies (keyword, reply_text, reply_photo_id, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(keyword) DO UPDATE SET
               reply_text = excluded.reply_text,
               reply_photo_id = COALESCE(excluded.reply_photo_id, reply_photo_id)",
        )
        .bind(keyword)
        .bind(reply_text)
        .bind(reply_photo_id)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete by keyword. Returns false when nothing matched.
    pub async fn delete(&self, keyword: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auto_replies WHERE keyword = ?")
            .bind(keyword)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All configured replies in insertion order.
    pub async fn list(&self) -> Result<Vec<AutoReply>> {
        Ok(
            sqlx::query_as::<_, AutoReply>(&format!("{SELECT_REPLY} ORDER BY id ASC"))
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> AutoReplyStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        AutoReplyStore::init(&pool).await.unwrap();
        AutoReplyStore::new(pool)
    }

    #[tokio::test]
    async fn match_is_case_insensitive_substring() {
        let store = test_store().await;
        store.upsert("price", "See our price list.", None).await.unwrap();

        let hit = store.find_match("What's the PRICE today?").await.unwrap();
        assert_eq!(hit.unwrap().reply_text, "See our price list.");

        assert!(store.find_match("hello there").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_configured_keyword_wins() {
        let store = test_store().await;
        store.upsert("ship", "We ship worldwide.", None).await.unwrap();
        store.upsert("shipping", "Shipping takes 3 days.", None).await.unwrap();

        // Both keywords match; insertion order decides.
        let hit = store.find_match("how about shipping?").await.unwrap().unwrap();
        assert_eq!(hit.keyword, "ship");
    }

    #[tokio::test]
    async fn upsert_updates_and_keeps_photo() {
        let store = test_store().await;
        store.upsert("help", "Old text", Some("photo1")).await.unwrap();
        store.upsert("help", "New text", None).await.unwrap();

        let replies = store.list().await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].reply_text, "New text");
        assert_eq!(replies[0].reply_photo_id.as_deref(), Some("photo1"));
    }

    #[tokio::test]
    async fn delete_reports_whether_found() {
        let store = test_store().await;
        store.upsert("bye", "Goodbye!", None).await.unwrap();

        assert!(store.delete("bye").await.unwrap());
        assert!(!store.delete("bye").await.unwrap());
    }
}
