use sqlx::SqlitePool;

use {crate::Result, ombud_common::now_ms};

/// One sender's standing in a group over a time window.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeaderboardRow {
    pub username: Option<String>,
    pub message_count: i64,
}

/// Text-only log of group chatter, kept for leaderboards.
#[derive(Clone)]
pub struct GroupMessageLog {
    pool: SqlitePool,
}

impl GroupMessageLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS group_messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id        INTEGER NOT NULL,
                sender_id       INTEGER,
                sender_username TEXT,
                text            TEXT    NOT NULL,
                created_at      INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_group_messages_group_created
             ON group_messages (group_id, created_at)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn record(
        &self,
        group_id: i64,
        sender_id: i64,
        sender_username: Option<&str>,
        text: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO group_messages (group_id, sender_id, sender_username, text, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(group_id)
        .bind(sender_id)
        .bind(sender_username)
        .bind(text)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Top senders in a group since `since_ms`, busiest first.
    pub async fn leaderboard(
        &self,
        group_id: i64,
        since_ms: i64,
        limit: u32,
    ) -> Result<Vec<LeaderboardRow>> {
        Ok(sqlx::query_as::<_, LeaderboardRow>(
            "SELECT sender_username AS username, COUNT(*) AS message_count
             FROM group_messages
             WHERE group_id = ? AND created_at >= ?
             GROUP BY sender_username
             ORDER BY message_count DESC
             LIMIT ?",
        )
        .bind(group_id)
        .bind(since_ms)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_log() -> GroupMessageLog {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        GroupMessageLog::init(&pool).await.unwrap();
        GroupMessageLog::new(pool)
    }

    #[tokio::test]
    async fn leaderboard_ranks_by_count() {
        let log = test_log().await;

        for _ in 0..3 {
            log.record(1, 10, Some("alice"), "hi").await.unwrap();
        }
        log.record(1, 11, Some("bob"), "yo").await.unwrap();
        // Other group is not counted.
        log.record(2, 11, Some("bob"), "elsewhere").await.unwrap();

        let rows = log.leaderboard(1, 0, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].username.as_deref(), Some("alice"));
        assert_eq!(rows[0].message_count, 3);
        assert_eq!(rows[1].message_count, 1);
    }

    #[tokio::test]
    async fn leaderboard_respects_window() {
        let log = test_log().await;

        log.record(1, 10, Some("alice"), "old").await.unwrap();
        let cutoff = now_ms() + 1;

        let rows = log.leaderboard(1, cutoff, 10).await.unwrap();
        assert!(rows.is_empty());
    }
}
