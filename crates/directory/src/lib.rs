//! Identity directory: user and group records.
//!
//! Owns the `users` and `groups` tables and the username ↔ platform-id
//! reconciliation rule: a user referenced by username before they ever
//! messaged the bot (platform id NULL) is claimed in place by their first
//! real contact instead of being duplicated.

pub mod error;
pub mod group;
pub mod user;

pub use {
    error::{Error, Result},
    group::{Group, GroupDirectory},
    user::{User, UserDirectory},
};

/// Create the directory tables. Call once at startup.
pub async fn init_schema(pool: &sqlx::SqlitePool) -> Result<()> {
    UserDirectory::init(pool).await?;
    GroupDirectory::init(pool).await?;
    Ok(())
}
