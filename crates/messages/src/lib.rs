//! Append-only message log.
//!
//! Two logs: per-user relay messages (with read/unread marking, paginated
//! history, explicit purge) and text-only group messages carrying sender
//! attribution for leaderboard aggregation.

pub mod error;
pub mod group_log;
pub mod store;

pub use {
    error::{Error, Result},
    group_log::{GroupMessageLog, LeaderboardRow},
    store::{MessageRecord, MessageStore},
};

/// Create the message tables. Call once at startup.
pub async fn init_schema(pool: &sqlx::SqlitePool) -> Result<()> {
    MessageStore::init(pool).await?;
    GroupMessageLog::init(pool).await?;
    Ok(())
}
