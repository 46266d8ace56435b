use quill_config::ConfigError;
use quill_fs::FsError;
use thiserror::Error;

/// Errors returned synchronously by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A file load is already in progress")]
    LoadInProgress,

    #[error("A file save is in progress")]
    SaveInProgress,

    #[error("The file could not be loaded; the text shown is not its content")]
    LoadFailed,

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Message for the status line.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Fs(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
