//! Byte-level line scanner shared by the mapped and streamed load paths.
//!
//! The scanner is fed one or more byte chunks. It splits them into lines at
//! `\r\n`, lone `\r` and bare `\n`, decodes every line on its own (terminator
//! included) and keeps the EOL counters. Bytes after the last terminator of a
//! chunk are carried into the next one, and a `\r` that ends a chunk is held
//! until the next byte shows whether it starts a `\r\n` pair.

use tracing::trace;

use super::eol::EolCounts;
use crate::encoding::Charset;
use crate::progress::{CancellationFlag, ProgressSink, ProgressUpdate, progress_step};

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// What the caller should do after feeding a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Feed {
    Continue,
    Cancelled,
}

/// Everything a scan produced.
#[derive(Debug, Default)]
pub(crate) struct ScanOutput {
    pub text: String,
    pub counts: EolCounts,
    pub line_count: u64,
    pub replaced_spans: u64,
    pub consumed: u64,
}

pub(crate) struct LineScanner {
    charset: Charset,
    total: u64,
    step: u64,
    next_report: u64,
    carry: Vec<u8>,
    pending_cr: bool,
    out: ScanOutput,
}

impl LineScanner {
    pub fn new(charset: Charset, total: u64, steps: u64) -> Self {
        let step = progress_step(total, steps);
        LineScanner {
            charset,
            total,
            step,
            next_report: step,
            carry: Vec::new(),
            pending_cr: false,
            out: ScanOutput::default(),
        }
    }

    pub fn consumed(&self) -> u64 {
        self.out.consumed
    }

    /// Scan one chunk. The cancellation flag is polled before every byte.
    pub fn feed<P: ProgressSink + ?Sized>(
        &mut self,
        chunk: &[u8],
        progress: &mut P,
        cancel: &CancellationFlag,
    ) -> Feed {
        let mut span_start = 0;
        let mut i = 0;

        if self.pending_cr && !chunk.is_empty() {
            self.pending_cr = false;
            if chunk[0] == LF {
                self.out.counts.windows_lf += 1;
                i = 1;
                self.advance(1, progress);
            } else {
                self.out.counts.missing_lf += 1;
            }
            self.emit_line(&chunk[..i]);
            span_start = i;
        }

        while i < chunk.len() {
            if cancel.is_cancelled() {
                return Feed::Cancelled;
            }
            let byte = chunk[i];
            i += 1;
            match byte {
                CR => {
                    self.out.counts.windows_cr += 1;
                    match chunk.get(i) {
                        Some(&LF) => {
                            self.out.counts.windows_lf += 1;
                            i += 1;
                            self.advance(1, progress);
                            self.emit_line(&chunk[span_start..i]);
                            span_start = i;
                        }
                        Some(_) => {
                            self.out.counts.missing_lf += 1;
                            self.emit_line(&chunk[span_start..i]);
                            span_start = i;
                        }
                        None => self.pending_cr = true,
                    }
                }
                LF => {
                    self.out.counts.unix_lf += 1;
                    self.emit_line(&chunk[span_start..i]);
                    span_start = i;
                }
                _ => {}
            }
            self.advance(1, progress);
        }

        self.carry.extend_from_slice(&chunk[span_start..]);
        Feed::Continue
    }

    /// End of input: settle a trailing `\r` and decode the unterminated last line.
    pub fn finish(mut self) -> ScanOutput {
        if self.pending_cr {
            self.pending_cr = false;
            self.out.counts.missing_lf += 1;
        }
        if !self.carry.is_empty() {
            self.emit_line(&[]);
        }
        self.out
    }

    /// Stop early, dropping the partially scanned line.
    pub fn abandon(self) -> ScanOutput {
        self.out
    }

    fn emit_line(&mut self, span: &[u8]) {
        let had_errors = if self.carry.is_empty() {
            self.charset.decode_into(span, &mut self.out.text)
        } else {
            self.carry.extend_from_slice(span);
            let had_errors = self.charset.decode_into(&self.carry, &mut self.out.text);
            self.carry.clear();
            had_errors
        };
        if had_errors {
            self.out.replaced_spans += 1;
        }
        self.out.line_count += 1;
    }

    fn advance<P: ProgressSink + ?Sized>(&mut self, bytes: u64, progress: &mut P) {
        self.out.consumed += bytes;
        if self.out.consumed >= self.next_report {
            self.next_report = self.out.consumed + self.step;
            trace!(done = self.out.consumed, total = self.total, "load step");
            progress.report(ProgressUpdate::new(
                self.out.consumed,
                self.total,
                format!("Loading... {} of {} bytes", self.out.consumed, self.total),
            ));
        }
    }
}
