use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Directory(#[from] ombud_directory::Error),

    #[error(transparent)]
    Messages(#[from] ombud_messages::Error),

    #[error(transparent)]
    Queue(#[from] ombud_queue::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
