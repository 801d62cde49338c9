use {sqlx::SqlitePool, tracing::info};

use {
    crate::{Error, Result},
    ombud_common::now_ms,
};

/// A directory entry for one end user.
///
/// `telegram_id` stays NULL for placeholders created from a bare username
/// (an admin opened a session with someone who never contacted the bot);
/// such a user cannot receive outbound delivery until reconciled.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_id: Option<i64>,
    pub username: Option<String>,
    pub first_seen: i64,
    pub last_seen: i64,
}

impl User {
    /// Whether direct outbound delivery is possible.
    #[must_use]
    pub fn reachable(&self) -> bool {
        self.telegram_id.is_some()
    }

    /// `@username` when known, otherwise the platform id, otherwise the row id.
    #[must_use]
    pub fn handle(&self) -> String {
        match (&self.username, self.telegram_id) {
            (Some(name), _) => format!("@{name}"),
            (None, Some(tid)) => tid.to_string(),
            (None, None) => format!("#{}", self.id),
        }
    }
}

const SELECT_USER: &str = "SELECT id, telegram_id, username, first_seen, last_seen FROM users";

/// SQLite-backed user directory.
#[derive(Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id INTEGER UNIQUE,
                username    TEXT,
                first_seen  INTEGER NOT NULL,
                last_seen   INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_username ON users (username)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Resolve the sender of a real inbound contact, creating or reconciling
    /// as needed.
    ///
    /// Lookup order: by platform id; then, for a first contact, by
    /// case-insensitive username among placeholder rows (platform id NULL),
    /// which claims the placeholder in place. Otherwise a fresh row.
    /// Existing rows get `last_seen` and `username` refreshed.
    pub async fn resolve_contact(&self, telegram_id: i64, username: Option<&str>) -> Result<User> {
        let now = now_ms();

        if let Some(user) = self.find_by_telegram_id(telegram_id).await? {
            sqlx::query("UPDATE users SET last_seen = ?, username = COALESCE(?, username) WHERE id = ?")
                .bind(now)
                .bind(username)
                .bind(user.id)
                .execute(&self.pool)
                .await?;
            return self.get(user.id).await;
        }

        if let Some(name) = username {
            let placeholder = sqlx::query_as::<_, User>(&format!(
                "{SELECT_USER} WHERE lower(username) = lower(?) AND telegram_id IS NULL"
            ))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(user) = placeholder {
                info!(user_id = user.id, telegram_id, "claiming placeholder user");
                sqlx::query(
                    "UPDATE users SET telegram_id = ?, username = ?, last_seen = ? WHERE id = ?",
                )
                .bind(telegram_id)
                .bind(name)
                .bind(now)
                .bind(user.id)
                .execute(&self.pool)
                .await?;
                return self.get(user.id).await;
            }
        }

        let id = sqlx::query(
            "INSERT INTO users (telegram_id, username, first_seen, last_seen) VALUES (?, ?, ?, ?)",
        )
        .bind(telegram_id)
        .bind(username)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get(id).await
    }

    /// Create a placeholder row for a user who has never contacted the bot.
    pub async fn create_placeholder(&self, username: &str) -> Result<User> {
        let now = now_ms();
        let id = sqlx::query(
            "INSERT INTO users (telegram_id, username, first_seen, last_seen) VALUES (NULL, ?, ?, ?)",
        )
        .bind(username)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::UserNotFound(format!("#{id}")))
    }

    pub async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE telegram_id = ?"))
                .bind(telegram_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Case-insensitive username lookup. Prefers a reconciled row over a
    /// placeholder when both exist.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "{SELECT_USER} WHERE lower(username) = lower(?) \
             ORDER BY telegram_id IS NULL LIMIT 1"
        ))
        .bind(username.trim_start_matches('@'))
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Users with a platform id, i.e. valid broadcast recipients.
    pub async fn reachable(&self) -> Result<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "{SELECT_USER} WHERE telegram_id IS NOT NULL ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    /// One page of users, most recently seen first. Returns the page plus
    /// the total row count.
    pub async fn list_page(&self, page: u32, per_page: u32) -> Result<(Vec<User>, i64)> {
        let offset = (page.max(1) - 1) * per_page;
        let users = sqlx::query_as::<_, User>(&format!(
            "{SELECT_USER} ORDER BY last_seen DESC LIMIT ? OFFSET ?"
        ))
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok((users, total))
    }
}
