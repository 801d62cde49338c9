use sqlx::SqlitePool;

use {
    crate::{Error, Result},
    ombud_common::now_ms,
};

/// A group chat the bot has been added to.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub telegram_id: i64,
    pub title: String,
    pub username: Option<String>,
    pub first_seen: i64,
    pub last_seen: i64,
}

const SELECT_GROUP: &str =
    "SELECT id, telegram_id, title, username, first_seen, last_seen FROM groups";

/// SQLite-backed group directory.
#[derive(Clone)]
pub struct GroupDirectory {
    pool: SqlitePool,
}

impl GroupDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS groups (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id INTEGER NOT NULL UNIQUE,
                title       TEXT    NOT NULL,
                username    TEXT,
                first_seen  INTEGER NOT NULL,
                last_seen   INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Upsert by platform id; an existing group gets its title and
    /// `last_seen` refreshed (groups get renamed).
    pub async fn resolve(
        &self,
        telegram_id: i64,
        title: &str,
        username: Option<&str>,
    ) -> Result<Group> {
        let now = now_ms();
        sqlx::query(
            "INSERT INTO groups (telegram_id, title, username, first_seen, last_seen)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(telegram_id) DO UPDATE SET
               title = excluded.title,
               username = COALESCE(excluded.username, username),
               last_seen = excluded.last_seen",
        )
        .bind(telegram_id)
        .bind(title)
        .bind(username)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        // The rowid reported on conflict is unreliable; fetch by unique key.
        self.find_by_telegram_id(telegram_id)
            .await?
            .ok_or(Error::GroupNotFound(telegram_id))
    }

    pub async fn get(&self, id: i64) -> Result<Group> {
        sqlx::query_as::<_, Group>(&format!("{SELECT_GROUP} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::GroupNotFound(id))
    }

    pub async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<Group>> {
        Ok(
            sqlx::query_as::<_, Group>(&format!("{SELECT_GROUP} WHERE telegram_id = ?"))
                .bind(telegram_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// One page of groups, most recently seen first, plus the total count.
    pub async fn list_page(&self, page: u32, per_page: u32) -> Result<(Vec<Group>, i64)> {
        let offset = (page.max(1) - 1) * per_page;
        let groups = sqlx::query_as::<_, Group>(&format!(
            "{SELECT_GROUP} ORDER BY last_seen DESC LIMIT ? OFFSET ?"
        ))
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM groups")
            .fetch_one(&self.pool)
            .await?;

        Ok((groups, total))
    }
}
