//! Chunked file saving with backup rotation and transcoding.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::eol::{LineEnding, convert_line_endings};
use crate::backup::{BackupReport, BackupRotator};
use crate::encoding::{Charset, TextEncoder};
use crate::error::{FsError, FsResult};
use crate::progress::{CancellationFlag, ProgressSink, ProgressUpdate, progress_step};

/// Configuration for file saving operations
#[derive(Debug, Clone)]
pub struct SaveConfig {
    /// Texts shorter than this many characters are written in one call (default: 10)
    pub split_threshold: usize,
    /// Number of slices a longer text is split into (default: 20)
    pub progress_steps: usize,
    /// Buffer size for the file writer (default: 64KB)
    pub buffer_size: usize,
    /// Whether to fsync the file before reporting success
    pub sync: bool,
    /// Whether to copy the permissions of the replaced file (Unix only)
    pub preserve_permissions: bool,
    /// Convert every line terminator before writing
    pub line_ending: Option<LineEnding>,
}

impl Default for SaveConfig {
    fn default() -> Self {
        SaveConfig {
            split_threshold: 10,
            progress_steps: 20,
            buffer_size: 64 * 1024,
            sync: true,
            preserve_permissions: true,
            line_ending: None,
        }
    }
}

/// A destination that passed [`check_save_target`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTarget {
    path: PathBuf,
    existed: bool,
}

impl SaveTarget {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was there before the check created it.
    pub fn existed(&self) -> bool {
        self.existed
    }
}

/// Check that `path` can be written, creating it as an empty file if missing.
///
/// A missing file that cannot be created leaves nothing behind.
pub fn check_save_target(path: &Path) -> FsResult<SaveTarget> {
    match fs::metadata(path) {
        Ok(metadata) => {
            if metadata.is_dir() {
                return Err(FsError::IsDirectory {
                    path: path.to_path_buf(),
                });
            }
            if !metadata.is_file() {
                return Err(FsError::NotRegularFile {
                    path: path.to_path_buf(),
                });
            }
            if metadata.permissions().readonly() {
                return Err(FsError::ReadOnly {
                    path: path.to_path_buf(),
                });
            }
            OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|source| FsError::NotWritable {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(SaveTarget {
                path: path.to_path_buf(),
                existed: true,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(|source| FsError::CreateFailed {
                    path: path.to_path_buf(),
                    source,
                })?;
            debug!(path = %path.display(), "created empty save target");
            Ok(SaveTarget {
                path: path.to_path_buf(),
                existed: false,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(FsError::NotWritable {
            path: path.to_path_buf(),
            source: e,
        }),
        Err(e) => Err(FsError::io("inspect", path, e)),
    }
}

/// Counters of a chunked write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Calls to the underlying writer
    pub writes: usize,
    pub chars_written: usize,
    pub bytes_written: u64,
}

/// How a chunked write ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEnd {
    Completed,
    Cancelled,
}

/// Writes text in progress-reporting slices through a streaming encoder.
pub struct ChunkedWriter<W: Write> {
    writer: W,
    encoder: TextEncoder,
    split_threshold: usize,
    steps: usize,
    stats: WriteStats,
    buffer: Vec<u8>,
}

impl<W: Write> ChunkedWriter<W> {
    pub fn new(writer: W, encoder: TextEncoder, config: &SaveConfig) -> Self {
        ChunkedWriter {
            writer,
            encoder,
            split_threshold: config.split_threshold,
            steps: config.progress_steps,
            stats: WriteStats::default(),
            buffer: Vec::new(),
        }
    }

    /// Write all of `text`.
    ///
    /// Below the split threshold the text goes out in one call without progress
    /// updates. Otherwise it is cut into `max(1, chars / steps)`-character
    /// slices, the remainder shorter than one slice going out last. The
    /// cancellation flag is checked before every slice.
    pub fn write_text<P: ProgressSink + ?Sized>(
        &mut self,
        text: &str,
        progress: &mut P,
        cancel: &CancellationFlag,
    ) -> io::Result<WriteEnd> {
        let total = text.chars().count();
        if total < self.split_threshold {
            self.write_slice(text, total, true)?;
            return Ok(WriteEnd::Completed);
        }

        let step = progress_step(total as u64, self.steps as u64) as usize;
        let mut rest = text;
        let mut remaining = total;
        while remaining > 0 {
            if cancel.is_cancelled() {
                return Ok(WriteEnd::Cancelled);
            }
            let take = step.min(remaining);
            let split = rest
                .char_indices()
                .nth(take)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let (slice, tail) = rest.split_at(split);
            remaining -= take;
            self.write_slice(slice, take, remaining == 0)?;
            rest = tail;

            progress.report(ProgressUpdate::new(
                self.stats.chars_written as u64,
                total as u64,
                format!("Saving... {} of {} characters", self.stats.chars_written, total),
            ));
        }
        Ok(WriteEnd::Completed)
    }

    fn write_slice(&mut self, slice: &str, chars: usize, last: bool) -> io::Result<()> {
        self.buffer.clear();
        self.encoder.encode_into(slice, &mut self.buffer, last);
        self.writer.write_all(&self.buffer)?;
        self.stats.writes += 1;
        self.stats.chars_written += chars;
        self.stats.bytes_written += self.buffer.len() as u64;
        Ok(())
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Characters the charset could not represent, written as `?`.
    pub fn unmappable(&self) -> usize {
        self.encoder.unmappable()
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// How a save ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Completed,
    Cancelled,
    Failed(String),
}

/// Result of a file saving operation
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub status: SaveStatus,
    pub bytes_written: u64,
    pub chars_written: usize,
    /// Slice writes performed
    pub writes: usize,
    /// Status line for the user
    pub message: String,
    /// Rotation report, or the message of a rotation that failed.
    /// `None` when the destination did not exist before the save.
    pub backup: Option<Result<BackupReport, String>>,
    pub unmappable_chars: usize,
}

impl SaveOutcome {
    pub fn success(&self) -> bool {
        self.status == SaveStatus::Completed
    }
}

/// Save `text` to a checked target.
///
/// Backups of an existing destination are rotated before the file is
/// truncated. A failed rotation is logged and recorded in the outcome but does
/// not stop the save.
pub fn save_file<P: ProgressSink + ?Sized>(
    target: &SaveTarget,
    text: &str,
    charset: Charset,
    config: &SaveConfig,
    rotator: &BackupRotator,
    progress: &mut P,
    cancel: &CancellationFlag,
) -> SaveOutcome {
    let start = Instant::now();
    let path = target.path();
    let text: Cow<'_, str> = match config.line_ending {
        Some(line_ending) => convert_line_endings(text, line_ending),
        None => Cow::Borrowed(text),
    };
    let total = text.chars().count() as u64;

    let mut outcome = SaveOutcome {
        status: SaveStatus::Completed,
        bytes_written: 0,
        chars_written: 0,
        writes: 0,
        message: String::new(),
        backup: None,
        unmappable_chars: 0,
    };

    if cancel.is_cancelled() {
        outcome.status = SaveStatus::Cancelled;
        outcome.message = "Cancelled".to_string();
        progress.report(ProgressUpdate::new(0, total, outcome.message.clone()));
        return outcome;
    }
    progress.report(ProgressUpdate::new(0, total, "File saving started."));

    let permissions = if target.existed() && config.preserve_permissions {
        fs::metadata(path).ok().map(|m| m.permissions())
    } else {
        None
    };

    if target.existed() {
        outcome.backup = Some(rotator.rotate(path).map_err(|err| {
            warn!(path = %path.display(), error = %err, "backup rotation failed, saving anyway");
            err.user_message()
        }));
    }

    let written = File::create(path).and_then(|file| {
        if let Some(permissions) = permissions {
            if let Err(err) = file.set_permissions(permissions) {
                debug!(path = %path.display(), error = %err, "could not restore permissions");
            }
        }
        let buffered = BufWriter::with_capacity(config.buffer_size.max(1), file);
        let mut writer = ChunkedWriter::new(buffered, charset.encoder(), config);
        let end = writer.write_text(&text, progress, cancel);
        outcome.writes = writer.stats().writes;
        outcome.chars_written = writer.stats().chars_written;
        outcome.bytes_written = writer.stats().bytes_written;
        outcome.unmappable_chars = writer.unmappable();
        let end = end?;
        writer.get_mut().flush()?;
        if config.sync {
            writer.get_mut().get_ref().sync_all()?;
        }
        Ok(end)
    });

    match written {
        Ok(WriteEnd::Completed) => {
            outcome.message = format!("File Saved ({} bytes).", outcome.bytes_written);
            info!(
                path = %path.display(),
                bytes = outcome.bytes_written,
                writes = outcome.writes,
                unmappable = outcome.unmappable_chars,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "save finished"
            );
        }
        Ok(WriteEnd::Cancelled) => {
            outcome.status = SaveStatus::Cancelled;
            outcome.message = "Cancelled".to_string();
            warn!(path = %path.display(), chars = outcome.chars_written, "save cancelled, file is incomplete");
        }
        Err(err) => {
            let err = FsError::io("write", path, err);
            outcome.message = err.user_message();
            outcome.status = SaveStatus::Failed(outcome.message.clone());
            warn!(path = %path.display(), error = %err, "save failed");
        }
    }
    progress.report(ProgressUpdate::new(
        outcome.chars_written as u64,
        total,
        outcome.message.clone(),
    ));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupConfig;
    use crate::file::load::{LoadConfig, load_file};
    use crate::progress::NoProgress;
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingWriter {
        calls: usize,
        bytes: Vec<u8>,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailAfter(usize);

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::other("disk full"));
            }
            self.0 -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn chunked(text: &str) -> (WriteStats, CountingWriter, usize) {
        let mut updates = 0;
        let mut sink = |_: ProgressUpdate| updates += 1;
        let mut writer = ChunkedWriter::new(
            CountingWriter::default(),
            Charset::utf8().encoder(),
            &SaveConfig::default(),
        );
        let end = writer
            .write_text(text, &mut sink, &CancellationFlag::new())
            .unwrap();
        assert_eq!(end, WriteEnd::Completed);
        let stats = writer.stats();
        (stats, writer.into_inner(), updates)
    }

    #[test]
    fn test_short_text_single_write() {
        let (stats, inner, updates) = chunked("short");
        assert_eq!(stats.writes, 1);
        assert_eq!(inner.calls, 1);
        assert_eq!(updates, 0);
        assert_eq!(inner.bytes, b"short");
    }

    #[test]
    fn test_thousand_chars_twenty_slices() {
        let text = "x".repeat(1000);
        let (stats, inner, updates) = chunked(&text);
        assert_eq!(stats.writes, 20);
        assert_eq!(inner.calls, 20);
        assert_eq!(updates, 20);
        assert_eq!(stats.chars_written, 1000);
    }

    #[test]
    fn test_remainder_written_last() {
        let text = "y".repeat(1010);
        let (stats, inner, _) = chunked(&text);
        assert_eq!(stats.writes, 21);
        assert_eq!(inner.bytes.len(), 1010);
    }

    #[test]
    fn test_slices_respect_char_boundaries() {
        let text = "añb€".repeat(30);
        let (stats, inner, _) = chunked(&text);
        assert_eq!(stats.chars_written, 120);
        assert_eq!(inner.bytes, text.as_bytes());
    }

    #[test]
    fn test_write_error_stops_immediately() {
        let text = "z".repeat(100);
        let mut writer = ChunkedWriter::new(FailAfter(1), Charset::utf8().encoder(), &SaveConfig::default());
        let err = writer
            .write_text(&text, &mut NoProgress, &CancellationFlag::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(writer.stats().writes, 1);
    }

    #[test]
    fn test_cancel_between_slices() {
        let text = "z".repeat(1000);
        let cancel = CancellationFlag::new();
        let trigger = cancel.clone();
        let mut sink = |u: ProgressUpdate| {
            if u.done >= 100 {
                trigger.cancel();
            }
        };
        let mut writer = ChunkedWriter::new(
            CountingWriter::default(),
            Charset::utf8().encoder(),
            &SaveConfig::default(),
        );
        let end = writer.write_text(&text, &mut sink, &cancel).unwrap();
        assert_eq!(end, WriteEnd::Cancelled);
        assert_eq!(writer.stats().writes, 2);
    }

    fn save(target: &SaveTarget, text: &str, charset: Charset, config: &SaveConfig) -> SaveOutcome {
        save_file(
            target,
            text,
            charset,
            config,
            &BackupRotator::new(BackupConfig::default()),
            &mut NoProgress,
            &CancellationFlag::new(),
        )
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let content = "first line\r\nsecond\nthird\rwith ünïcödé and a long tail of text\n".repeat(5);
        fs::write(&source, &content).unwrap();

        let loaded = load_file(
            &source,
            Charset::utf8(),
            &LoadConfig::default(),
            &mut NoProgress,
            &CancellationFlag::new(),
        )
        .unwrap();
        let copy = dir.path().join("copy.txt");
        let target = check_save_target(&copy).unwrap();
        assert!(!target.existed());
        let outcome = save(&target, &loaded.text, Charset::utf8(), &SaveConfig::default());
        assert!(outcome.success(), "{}", outcome.message);
        assert!(outcome.backup.is_none());
        assert_eq!(fs::read(&copy).unwrap(), content.as_bytes());
        assert_eq!(outcome.bytes_written, content.len() as u64);
    }

    #[test]
    fn test_binary_round_trip() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("blob.bin");
        let bytes: Vec<u8> = (0..=255u8).cycle().take(2048).collect();
        fs::write(&source, &bytes).unwrap();

        let loaded = load_file(
            &source,
            Charset::binary(),
            &LoadConfig::default(),
            &mut NoProgress,
            &CancellationFlag::new(),
        )
        .unwrap();
        let copy = dir.path().join("blob.out");
        let target = check_save_target(&copy).unwrap();
        let outcome = save(&target, &loaded.text, Charset::binary(), &SaveConfig::default());
        assert!(outcome.success());
        assert_eq!(fs::read(&copy).unwrap(), bytes);
    }

    #[test]
    fn test_existing_file_is_backed_up_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "old").unwrap();

        let target = check_save_target(&path).unwrap();
        assert!(target.existed());
        let outcome = save(&target, "new content", Charset::utf8(), &SaveConfig::default());
        assert!(outcome.success());
        assert_eq!(fs::read_to_string(&path).unwrap(), "new content");
        assert_eq!(fs::read_to_string(dir.path().join("notes.bak")).unwrap(), "old");
        let report = outcome.backup.unwrap().unwrap();
        assert_eq!(report.backup, Some(dir.path().join("notes.bak")));
    }

    #[test]
    fn test_backup_failure_does_not_block_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "old").unwrap();
        // A directory in the oldest slot cannot be deleted with remove_file.
        fs::create_dir(dir.path().join("notes.bak")).unwrap();

        let target = check_save_target(&path).unwrap();
        let rotator = BackupRotator::new(BackupConfig {
            max_backups: 1,
            ..BackupConfig::default()
        });
        let outcome = save_file(
            &target,
            "new",
            Charset::utf8(),
            &SaveConfig::default(),
            &rotator,
            &mut NoProgress,
            &CancellationFlag::new(),
        );
        assert!(outcome.success());
        assert!(matches!(outcome.backup, Some(Err(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_unmappable_and_line_ending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.txt");
        let target = check_save_target(&path).unwrap();
        let config = SaveConfig {
            line_ending: Some(LineEnding::Crlf),
            ..SaveConfig::default()
        };
        let charset = Charset::resolve("windows-1252").unwrap();
        let outcome = save(&target, "caf\u{e9}\n\u{4E2D}\n", charset, &config);
        assert!(outcome.success());
        assert_eq!(outcome.unmappable_chars, 1);
        assert_eq!(fs::read(&path).unwrap(), b"caf\xE9\r\n?\r\n");
    }

    #[test]
    fn test_cancelled_before_start_leaves_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        fs::write(&path, "keep").unwrap();
        let target = check_save_target(&path).unwrap();
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let outcome = save_file(
            &target,
            "replace",
            Charset::utf8(),
            &SaveConfig::default(),
            &BackupRotator::default(),
            &mut NoProgress,
            &cancel,
        );
        assert_eq!(outcome.status, SaveStatus::Cancelled);
        assert_eq!(outcome.writes, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");
    }

    #[test]
    fn test_missing_parent_creates_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("out.txt");
        let err = check_save_target(&path).unwrap_err();
        assert!(matches!(err, FsError::CreateFailed { .. }));
        assert!(err.to_string().contains("out.txt"));
        assert!(!path.exists());
        assert!(!dir.path().join("no_such_dir").exists());
    }

    #[test]
    fn test_directory_target_refused() {
        let dir = tempdir().unwrap();
        let err = check_save_target(dir.path()).unwrap_err();
        assert!(matches!(err, FsError::IsDirectory { .. }));
    }

    #[test]
    fn test_read_only_target_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.txt");
        fs::write(&path, "x").unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();

        let err = check_save_target(&path).unwrap_err();
        assert!(matches!(err, FsError::ReadOnly { .. }));
        assert!(err.to_string().contains("read-only"));
    }
}
