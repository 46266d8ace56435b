//! File loading: pre-flight checks, memory-mapped or streamed scanning, and
//! the result handed to the editor session.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::time::{Duration, Instant};

use memmap2::Mmap;
use tracing::{debug, info, warn};

use super::eol::{EolClassification, EolCounts};
use super::scan::{Feed, LineScanner, ScanOutput};
use crate::encoding::Charset;
use crate::error::{FsError, FsResult};
use crate::progress::{CancellationFlag, ProgressSink, ProgressUpdate};

/// Configuration for file loading operations
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Map the file instead of reading it (default: true)
    pub use_mmap: bool,
    /// Buffer size for the streamed read path (default: 64KB)
    pub chunk_size: usize,
    /// Largest file accepted, in bytes (default: `i32::MAX`)
    pub max_file_size: u64,
    /// Number of progress updates spread over the file (default: 20)
    pub progress_steps: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            use_mmap: true,
            chunk_size: 64 * 1024,
            max_file_size: i32::MAX as u64,
            progress_steps: 20,
        }
    }
}

/// How a load ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Completed,
    /// Stopped by the cancellation flag; the text holds every fully scanned line.
    Cancelled,
    /// A read or map error; the text holds what was decoded before it.
    Failed(String),
}

/// Result of a file loading operation
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// Decoded content, line terminators preserved
    pub text: String,
    /// Bytes consumed by the scanner
    pub byte_count: u64,
    pub eol: EolClassification,
    pub eol_counts: EolCounts,
    /// Number of decoded line spans
    pub line_count: u64,
    /// `\r` bytes not followed by `\n`
    pub malformed_sequence_count: u64,
    /// Lines whose decode substituted U+FFFD
    pub replaced_spans: u64,
    pub status: LoadStatus,
    pub elapsed: Duration,
}

impl LoadResult {
    pub fn is_complete(&self) -> bool {
        self.status == LoadStatus::Completed
    }

    fn from_scan(out: ScanOutput, status: LoadStatus, elapsed: Duration) -> Self {
        LoadResult {
            text: out.text,
            byte_count: out.consumed,
            eol: out.counts.classify(),
            eol_counts: out.counts,
            line_count: out.line_count,
            malformed_sequence_count: out.counts.missing_lf,
            replaced_spans: out.replaced_spans,
            status,
            elapsed,
        }
    }
}

/// Verify that `path` can be loaded and return its size.
///
/// Runs before any worker starts so refusals reach the caller synchronously.
pub fn check_load_path(path: &Path, max_file_size: u64) -> FsResult<u64> {
    let metadata = fs::metadata(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => FsError::NotFound {
            path: path.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => FsError::NotReadable {
            path: path.to_path_buf(),
            source,
        },
        _ => FsError::io("inspect", path, source),
    })?;

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

    let size = metadata.len();
    let limit = max_file_size.min(usize::MAX as u64);
    if size > limit {
        return Err(FsError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }

    File::open(path).map_err(|source| FsError::NotReadable {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(size)
}

/// Load `path`, decoding it with `charset` line by line.
///
/// Path problems are returned as errors before scanning starts. Once scanning
/// has started the function always returns a [`LoadResult`]; cancellation and
/// read failures are reported through [`LoadResult::status`] together with the
/// text decoded up to that point.
pub fn load_file<P: ProgressSink + ?Sized>(
    path: &Path,
    charset: Charset,
    config: &LoadConfig,
    progress: &mut P,
    cancel: &CancellationFlag,
) -> FsResult<LoadResult> {
    let size = check_load_path(path, config.max_file_size)?;
    let mut file = File::open(path).map_err(|source| FsError::NotReadable {
        path: path.to_path_buf(),
        source,
    })?;

    if config.use_mmap && size > 0 {
        match map_file(&file) {
            Ok(map) => {
                let result = run_scan(path, charset, config, size, progress, |scanner, progress| {
                    Ok(scanner.feed(&map, progress, cancel))
                });
                return Ok(result);
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "mmap unavailable, reading instead");
            }
        }
    }
    Ok(load_reader(path, &mut file, size, charset, config, progress, cancel))
}

/// Load from an already opened reader, reading `config.chunk_size` bytes at
/// a time. `path` names the source in messages and `size` is the expected
/// length used for progress.
pub fn load_reader<R: Read, P: ProgressSink + ?Sized>(
    path: &Path,
    reader: &mut R,
    size: u64,
    charset: Charset,
    config: &LoadConfig,
    progress: &mut P,
    cancel: &CancellationFlag,
) -> LoadResult {
    run_scan(path, charset, config, size, progress, |scanner, progress| {
        stream_file(reader, config.chunk_size, scanner, progress, cancel)
    })
}

fn run_scan<P, F>(
    path: &Path,
    charset: Charset,
    config: &LoadConfig,
    size: u64,
    progress: &mut P,
    feed: F,
) -> LoadResult
where
    P: ProgressSink + ?Sized,
    F: FnOnce(&mut LineScanner, &mut P) -> io::Result<Feed>,
{
    let start = Instant::now();
    debug!(path = %path.display(), size, charset = %charset, "loading file");
    progress.report(ProgressUpdate::new(0, size, "File loading started."));

    let mut scanner = LineScanner::new(charset, size, config.progress_steps);
    let scanned = feed(&mut scanner, progress);

    let result = match scanned {
        Ok(Feed::Continue) => {
            let out = scanner.finish();
            let message = format!("File Loaded ({} bytes).", out.consumed);
            progress.report(ProgressUpdate::new(out.consumed, size, message));
            LoadResult::from_scan(out, LoadStatus::Completed, start.elapsed())
        }
        Ok(Feed::Cancelled) => {
            let out = scanner.abandon();
            progress.report(ProgressUpdate::new(out.consumed, size, "Cancelled"));
            LoadResult::from_scan(out, LoadStatus::Cancelled, start.elapsed())
        }
        Err(err) => {
            let message = load_failure_message(path, charset, &err);
            warn!(path = %path.display(), error = %err, "load failed");
            let out = scanner.finish();
            progress.report(ProgressUpdate::new(out.consumed, size, message.clone()));
            LoadResult::from_scan(out, LoadStatus::Failed(message), start.elapsed())
        }
    };

    info!(
        path = %path.display(),
        bytes = result.byte_count,
        lines = result.line_count,
        eol = result.eol.tag(),
        malformed = result.malformed_sequence_count,
        status = ?result.status,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "load finished"
    );
    result
}

/// Status text for a load that hit an I/O error.
pub fn load_failure_message(path: &Path, charset: Charset, err: &dyn std::fmt::Display) -> String {
    format!(
        "Error loading file {} with charset {}: {}\n\
         Try to open the file with a different charset or open it as binary.",
        path.display(),
        charset,
        err
    )
}

fn map_file(file: &File) -> io::Result<Mmap> {
    // SAFETY: the map is read-only and dropped before `load_file` returns.
    // Another process truncating the file meanwhile is not guarded against.
    unsafe { Mmap::map(file) }
}

fn stream_file<R: Read, P: ProgressSink + ?Sized>(
    reader: &mut R,
    chunk_size: usize,
    scanner: &mut LineScanner,
    progress: &mut P,
    cancel: &CancellationFlag,
) -> io::Result<Feed> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(Feed::Continue),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if scanner.feed(&buffer[..read], progress, cancel) == Feed::Cancelled {
            return Ok(Feed::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    fn temp_with(bytes: &[u8]) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(bytes).unwrap();
        temp.flush().unwrap();
        temp
    }

    /// Serves `data` until `limit` bytes were read, then fails.
    struct FailAfter {
        data: Vec<u8>,
        pos: usize,
        limit: usize,
    }

    impl Read for FailAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos >= self.limit {
                return Err(io::Error::other("device disconnected"));
            }
            let n = buf
                .len()
                .min(self.limit - self.pos)
                .min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn load(path: &Path, config: &LoadConfig) -> LoadResult {
        load_file(path, Charset::utf8(), config, &mut NoProgress, &CancellationFlag::new()).unwrap()
    }

    #[test]
    fn test_load_crlf_file() {
        let temp = temp_with(b"line1\r\nline2\r\nline3");
        let result = load(temp.path(), &LoadConfig::default());
        assert!(result.is_complete());
        assert_eq!(result.text, "line1\r\nline2\r\nline3");
        assert_eq!(result.eol, EolClassification::WindowsCrlf);
        assert_eq!(result.line_count, 3);
        assert_eq!(result.byte_count, 19);
        assert_eq!(result.malformed_sequence_count, 0);
    }

    #[test]
    fn test_load_lone_cr() {
        let temp = temp_with(b"a\rb");
        let result = load(temp.path(), &LoadConfig::default());
        assert_eq!(result.text, "a\rb");
        assert_eq!(result.malformed_sequence_count, 1);
        assert_eq!(result.line_count, 2);
        assert_eq!(result.eol, EolClassification::WindowsCrlf);
    }

    #[test]
    fn test_load_empty_file() {
        let temp = temp_with(b"");
        let result = load(temp.path(), &LoadConfig::default());
        assert!(result.is_complete());
        assert_eq!(result.text, "");
        assert_eq!(result.eol, EolClassification::None);
        assert_eq!(result.line_count, 0);
    }

    #[test]
    fn test_streamed_matches_mapped() {
        let content = b"one\r\ntwo\nthr\xC3\xA9e\rfour\r\n\r\nlast";
        let temp = temp_with(content);
        let mapped = load(temp.path(), &LoadConfig::default());
        for chunk_size in 1..8 {
            let config = LoadConfig {
                use_mmap: false,
                chunk_size,
                ..LoadConfig::default()
            };
            let streamed = load(temp.path(), &config);
            assert_eq!(streamed.text, mapped.text, "chunk size {chunk_size}");
            assert_eq!(streamed.eol_counts, mapped.eol_counts, "chunk size {chunk_size}");
            assert_eq!(streamed.line_count, mapped.line_count, "chunk size {chunk_size}");
        }
        assert_eq!(mapped.eol, EolClassification::Mixed);
        assert_eq!(mapped.line_count, 6);
    }

    #[test]
    fn test_progress_cadence() {
        let temp = temp_with(&[b'x'; 1000]);
        let mut updates = Vec::new();
        let mut sink = |u: ProgressUpdate| updates.push(u);
        load_file(
            temp.path(),
            Charset::utf8(),
            &LoadConfig::default(),
            &mut sink,
            &CancellationFlag::new(),
        )
        .unwrap();
        let steps = updates.iter().filter(|u| u.message.starts_with("Loading")).count();
        assert_eq!(steps, 20);
        assert_eq!(updates.first().map(|u| u.done), Some(0));
        let last = updates.last().unwrap();
        assert_eq!(last.done, 1000);
        assert_eq!(last.message, "File Loaded (1000 bytes).");
    }

    #[test]
    fn test_cancel_returns_processed_lines() {
        let temp = temp_with("abc\n".repeat(10).as_bytes());
        let cancel = CancellationFlag::new();
        let trigger = cancel.clone();
        let mut sink = |u: ProgressUpdate| {
            if u.done >= 6 {
                trigger.cancel();
            }
        };
        let result = load_file(temp.path(), Charset::utf8(), &LoadConfig::default(), &mut sink, &cancel)
            .unwrap();
        assert_eq!(result.status, LoadStatus::Cancelled);
        assert_eq!(result.text, "abc\n");
    }

    #[test]
    fn test_read_error_keeps_decoded_text() {
        let data = b"one\ntwo\nthree\n".to_vec();
        let size = data.len() as u64;
        let mut reader = FailAfter {
            data,
            pos: 0,
            limit: 10,
        };
        let config = LoadConfig {
            use_mmap: false,
            chunk_size: 4,
            ..LoadConfig::default()
        };
        let mut updates = Vec::new();
        let mut sink = |u: ProgressUpdate| updates.push(u);
        let result = load_reader(
            Path::new("/data/broken.txt"),
            &mut reader,
            size,
            Charset::utf8(),
            &config,
            &mut sink,
            &CancellationFlag::new(),
        );

        let LoadStatus::Failed(message) = &result.status else {
            panic!("expected a failed load, got {:?}", result.status);
        };
        assert!(message.contains("/data/broken.txt"));
        assert!(message.contains("device disconnected"));
        assert!(message.contains("different charset"));
        assert!(message.contains("binary"));
        assert_eq!(result.text, "one\ntwo\nth");
        assert_eq!(result.byte_count, 10);
        assert_eq!(result.eol, EolClassification::UnixLf);
        assert!(!result.is_complete());
        assert_eq!(updates.last().map(|u| u.message.as_str()), Some(message.as_str()));
    }

    #[test]
    fn test_binary_charset_loads_anything() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        let temp = temp_with(&bytes);
        let result = load_file(
            temp.path(),
            Charset::binary(),
            &LoadConfig::default(),
            &mut NoProgress,
            &CancellationFlag::new(),
        )
        .unwrap();
        assert_eq!(result.replaced_spans, 0);
        assert_eq!(result.text.chars().count(), 256);
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempdir().unwrap();
        let err = check_load_path(dir.path(), u64::MAX).unwrap_err();
        assert!(matches!(err, FsError::IsDirectory { .. }));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempdir().unwrap();
        let err = check_load_path(&dir.path().join("nope.txt"), u64::MAX).unwrap_err();
        assert!(matches!(err, FsError::NotFound { .. }));
        assert!(err.to_string().contains("nope.txt"));
    }

    #[test]
    fn test_too_large_rejected() {
        let temp = temp_with(b"0123456789");
        let config = LoadConfig {
            max_file_size: 4,
            ..LoadConfig::default()
        };
        let err = load_file(temp.path(), Charset::utf8(), &config, &mut NoProgress, &CancellationFlag::new())
            .unwrap_err();
        assert!(matches!(err, FsError::TooLarge { size: 10, limit: 4, .. }));
    }
}
