use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Directory(#[from] ombud_directory::Error),

    #[error(transparent)]
    Messages(#[from] ombud_messages::Error),

    #[error(transparent)]
    AutoReply(#[from] ombud_auto_reply::Error),

    #[error(transparent)]
    Queue(#[from] ombud_queue::Error),

    #[error(transparent)]
    Session(#[from] ombud_sessions::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
