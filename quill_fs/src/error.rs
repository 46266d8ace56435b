//! Error types for file loading, saving and backup rotation.
//!
//! Every variant carries the path it refers to so the rendered message can be
//! shown to the user as-is. `user_message` and `suggestion` add the remediation
//! text surfaced by the editor session.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Coarse classification of an [`FsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The path is missing, unreadable, unwritable, a directory or too large.
    Path,
    /// The configured charset cannot be used.
    Decode,
    /// A read, write or map call failed mid-operation.
    Io,
    /// A delete or rename failed while rotating backups.
    Backup,
}

/// Errors raised by `quill_fs` operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// The file handle has no path (new, never saved buffer).
    #[error("File path is not set")]
    NoPath,

    #[error("File does not exist: {path}")]
    NotFound { path: PathBuf },

    #[error("Path is a directory: {path}")]
    IsDirectory { path: PathBuf },

    #[error("Not a regular file: {path}")]
    NotRegularFile { path: PathBuf },

    #[error("File is not readable: {path}")]
    NotReadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File exceeds the configured or addressable size limit.
    #[error("File is too big ({size} bytes, limit {limit}): {path}")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    /// A missing save destination could not be created.
    #[error("Could not create file: {path}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Destination has its write permission bits cleared.
    #[error("Could not save read-only file: {path}")]
    ReadOnly { path: PathBuf },

    /// Destination refused to open for writing.
    #[error("Could not save not writable file: {path}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Charset label not known to the encoding registry.
    #[error("Unknown charset: {name}")]
    UnknownCharset { name: String },

    /// Charset is known but its byte stream is not ASCII-compatible.
    #[error("Charset {name} is not supported for line scanning")]
    UnsupportedCharset { name: String },

    #[error("Failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Rename or delete failed while rotating backups.
    #[error("Failed to {operation} backup file: {path}")]
    Backup {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source of a backup rotation is not something that can be backed up.
    #[error("Could not create backup of {path}: {reason}")]
    BackupSource { path: PathBuf, reason: &'static str },
}

impl FsError {
    pub(crate) fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        FsError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn backup(operation: &'static str, path: &Path, source: io::Error) -> Self {
        FsError::Backup {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NoPath
            | FsError::NotFound { .. }
            | FsError::IsDirectory { .. }
            | FsError::NotRegularFile { .. }
            | FsError::NotReadable { .. }
            | FsError::TooLarge { .. }
            | FsError::CreateFailed { .. }
            | FsError::ReadOnly { .. }
            | FsError::NotWritable { .. } => ErrorKind::Path,
            FsError::UnknownCharset { .. } | FsError::UnsupportedCharset { .. } => {
                ErrorKind::Decode
            }
            FsError::Io { .. } => ErrorKind::Io,
            FsError::Backup { .. } | FsError::BackupSource { .. } => ErrorKind::Backup,
        }
    }

    /// The path this error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            FsError::NoPath
            | FsError::UnknownCharset { .. }
            | FsError::UnsupportedCharset { .. } => None,
            FsError::NotFound { path }
            | FsError::IsDirectory { path }
            | FsError::NotRegularFile { path }
            | FsError::NotReadable { path, .. }
            | FsError::TooLarge { path, .. }
            | FsError::CreateFailed { path, .. }
            | FsError::ReadOnly { path }
            | FsError::NotWritable { path, .. }
            | FsError::Io { path, .. }
            | FsError::Backup { path, .. }
            | FsError::BackupSource { path, .. } => Some(path),
        }
    }

    /// Message for the status line, including the underlying OS error if any.
    pub fn user_message(&self) -> String {
        match std::error::Error::source(self) {
            Some(source) => format!("{self} ({source})"),
            None => self.to_string(),
        }
    }

    /// How the user might get past this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            FsError::NoPath => Some("Use \"Save As\" to choose a file name."),
            FsError::ReadOnly { .. } => {
                Some("Clear the read-only flag or save the file under a different name.")
            }
            FsError::NotWritable { .. } | FsError::CreateFailed { .. } => {
                Some("Save the file to a location you have permission to write to.")
            }
            FsError::NotReadable { .. } => Some("Check that you have permission to read the file."),
            FsError::TooLarge { .. } => Some("Split the file or open it with a different tool."),
            FsError::UnknownCharset { .. } | FsError::UnsupportedCharset { .. } | FsError::Io { .. } => {
                Some("Try to open the file with a different charset or open it as binary.")
            }
            FsError::Backup { .. } | FsError::BackupSource { .. } => {
                Some("The file was saved without refreshing its backups.")
            }
            FsError::NotFound { .. } | FsError::IsDirectory { .. } | FsError::NotRegularFile { .. } => {
                None
            }
        }
    }
}

/// Result type for `quill_fs` operations.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let path = PathBuf::from("/tmp/x.txt");
        assert_eq!(FsError::IsDirectory { path: path.clone() }.kind(), ErrorKind::Path);
        assert_eq!(
            FsError::UnknownCharset { name: "nope".into() }.kind(),
            ErrorKind::Decode
        );
        let io_err = io::Error::new(io::ErrorKind::Other, "disk");
        assert_eq!(FsError::io("read", &path, io_err).kind(), ErrorKind::Io);
        let io_err = io::Error::new(io::ErrorKind::Other, "busy");
        assert_eq!(FsError::backup("rename", &path, io_err).kind(), ErrorKind::Backup);
    }

    #[test]
    fn test_message_names_path_and_source() {
        let err = FsError::NotWritable {
            path: PathBuf::from("/srv/data.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.user_message();
        assert!(msg.contains("/srv/data.txt"));
        assert!(msg.contains("denied"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_read_only_distinct_from_not_writable() {
        let path = PathBuf::from("a.txt");
        let read_only = FsError::ReadOnly { path: path.clone() };
        assert!(read_only.to_string().contains("read-only"));
        assert_ne!(read_only.suggestion(), FsError::NoPath.suggestion());
    }
}
