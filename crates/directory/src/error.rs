use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("group not found: {0}")]
    GroupNotFound(i64),
}

pub type Result<T> = std::result::Result<T, Error>;
