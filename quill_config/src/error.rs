use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O errors
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Configuration validation errors
    #[error("Configuration validation error: {0}")]
    Validation(String),
    /// The configured default charset cannot be used
    #[error("Configuration charset error: {0}")]
    Charset(#[from] quill_fs::FsError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
