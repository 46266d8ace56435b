//! # quill_fs - Streaming load/save engine for the quill editor
//!
//! Loads large text files line by line while classifying their line endings,
//! saves them back in progress-reporting slices, and rotates numbered backups
//! before every overwrite.
//!
//! Modules:
//! - `path` for splitting a path into directory, name and extension
//! - `encoding` for charset resolution and per-line decoding
//! - `file` for the loader, the saver and EOL handling
//! - `backup` for backup rotation
//! - `progress` for progress reporting and cancellation

mod backup;
mod encoding;
mod error;
mod file;
mod path;
mod progress;

pub use backup::{BackupConfig, BackupReport, BackupRotator, SkipReason, backup_path};
pub use encoding::{Charset, TextEncoder};
pub use error::{ErrorKind, FsError, FsResult};
pub use file::{
    ChunkedWriter, EolClassification, EolCounts, LineEnding, LoadConfig, LoadResult, LoadStatus,
    SaveConfig, SaveOutcome, SaveStatus, SaveTarget, WriteEnd, WriteStats, check_load_path,
    check_save_target, convert_line_endings, detect_eol, load_failure_message, load_file,
    load_reader, save_file,
};
pub use path::{FileHandle, file_extension, file_stem};
pub use progress::{CancellationFlag, NoProgress, ProgressSink, ProgressUpdate, progress_step};
