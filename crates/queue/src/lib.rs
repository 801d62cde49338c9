//! FIFO waiting queue of users awaiting an admin.
//!
//! A user appears at most once; order is insertion order, with the row id as
//! tie-break so same-millisecond arrivals cannot reorder. No priority, no
//! expiry — an entry leaves the queue only when a session opens for that
//! user or the queue is cleared by a purge.

pub mod error;

pub use error::{Error, Result};

use {ombud_common::now_ms, sqlx::SqlitePool};

/// SQLite-backed waiting queue.
#[derive(Clone)]
pub struct WaitingQueue {
    pool: SqlitePool,
}

impl WaitingQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_queue (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    INTEGER NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Add a user. Idempotent: a user already waiting keeps their place.
    /// Returns whether a new entry was created.
    pub async fn enqueue(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO user_queue (user_id, created_at) VALUES (?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove and return the earliest-queued user, if any.
    pub async fn dequeue_oldest(&self) -> Result<Option<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            "DELETE FROM user_queue
             WHERE id = (SELECT id FROM user_queue ORDER BY created_at ASC, id ASC LIMIT 1)
             RETURNING user_id",
        )
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Drop a specific user (a session just opened for them). Returns
    /// whether they were queued.
    pub async fn remove(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_queue WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn len(&self) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_queue")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_queue").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_queue() -> WaitingQueue {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        WaitingQueue::init(&pool).await.unwrap();
        WaitingQueue::new(pool)
    }

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = test_queue().await;

        queue.enqueue(1).await.unwrap();
        queue.enqueue(2).await.unwrap();
        queue.enqueue(3).await.unwrap();

        assert_eq!(queue.dequeue_oldest().await.unwrap(), Some(1));
        assert_eq!(queue.dequeue_oldest().await.unwrap(), Some(2));
        assert_eq!(queue.dequeue_oldest().await.unwrap(), Some(3));
        assert_eq!(queue.dequeue_oldest().await.unwrap(), None);
    }

    #[tokio::test]
    async fn enqueue_is_idempotent() {
        let queue = test_queue().await;

        assert!(queue.enqueue(7).await.unwrap());
        assert!(!queue.enqueue(7).await.unwrap());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn re_enqueue_keeps_original_place() {
        let queue = test_queue().await;

        queue.enqueue(1).await.unwrap();
        queue.enqueue(2).await.unwrap();
        queue.enqueue(1).await.unwrap();

        assert_eq!(queue.dequeue_oldest().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn remove_specific_user() {
        let queue = test_queue().await;

        queue.enqueue(1).await.unwrap();
        queue.enqueue(2).await.unwrap();

        assert!(queue.remove(2).await.unwrap());
        assert!(!queue.remove(2).await.unwrap());

        assert_eq!(queue.dequeue_oldest().await.unwrap(), Some(1));
        assert!(queue.is_empty().await.unwrap());
    }
}
