//! File operations: line-ending scanning, loading and chunked saving.
//!
//! This module provides:
//! - EOL counting, classification and conversion
//! - Memory-mapped or streamed loading with per-line decoding
//! - Chunked saving with backup rotation and transcoding

pub mod eol;
pub mod load;
pub mod save;
mod scan;

pub use eol::{EolClassification, EolCounts, LineEnding, convert_line_endings, detect_eol};
pub use load::{
    LoadConfig, LoadResult, LoadStatus, check_load_path, load_failure_message, load_file,
    load_reader,
};
pub use save::{
    ChunkedWriter, SaveConfig, SaveOutcome, SaveStatus, SaveTarget, WriteEnd, WriteStats,
    check_save_target, save_file,
};
