//! End-of-line counting, classification and conversion.

use std::borrow::Cow;
use std::fmt;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Line-termination convention of a loaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EolClassification {
    /// Only CR-based terminators (`\r\n`, or a lone `\r`).
    WindowsCrlf,
    /// Only bare `\n` terminators.
    UnixLf,
    /// Both kinds present.
    Mixed,
    /// No line terminator at all.
    None,
}

impl EolClassification {
    /// Short label for status bars.
    pub fn label(self) -> &'static str {
        match self {
            EolClassification::WindowsCrlf => "Win CRLF",
            EolClassification::UnixLf => "Unix LF",
            EolClassification::Mixed => "Mix CR LF",
            EolClassification::None => "no CR LF",
        }
    }

    /// Stable machine-readable tag.
    pub fn tag(self) -> &'static str {
        match self {
            EolClassification::WindowsCrlf => "windows-crlf",
            EolClassification::UnixLf => "unix-lf",
            EolClassification::Mixed => "mixed",
            EolClassification::None => "none",
        }
    }
}

impl fmt::Display for EolClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw terminator counters collected while scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EolCounts {
    /// Every `\r`, whether or not a `\n` follows.
    pub windows_cr: u64,
    /// `\n` bytes that completed a `\r\n` pair.
    pub windows_lf: u64,
    /// Bare `\n` bytes.
    pub unix_lf: u64,
    /// `\r` bytes not followed by `\n`.
    pub missing_lf: u64,
}

impl EolCounts {
    /// Count terminators in an in-memory byte slice.
    pub fn scan(bytes: &[u8]) -> Self {
        let mut counts = EolCounts::default();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                CR => {
                    counts.windows_cr += 1;
                    if bytes.get(i + 1) == Some(&LF) {
                        counts.windows_lf += 1;
                        i += 1;
                    } else {
                        counts.missing_lf += 1;
                    }
                }
                LF => counts.unix_lf += 1,
                _ => {}
            }
            i += 1;
        }
        counts
    }

    pub fn classify(&self) -> EolClassification {
        match (self.windows_cr > 0, self.unix_lf > 0) {
            (true, true) => EolClassification::Mixed,
            (true, false) => EolClassification::WindowsCrlf,
            (false, true) => EolClassification::UnixLf,
            (false, false) => EolClassification::None,
        }
    }

    /// Number of line boundaries seen.
    pub fn terminators(&self) -> u64 {
        self.windows_cr + self.unix_lf
    }
}

/// Classify the line endings of `bytes`.
pub fn detect_eol(bytes: &[u8]) -> EolClassification {
    EolCounts::scan(bytes).classify()
}

/// Line ending to write when the caller asks for a uniform convention on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Crlf,
    Lf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Crlf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }
}

/// Rewrite every `\r\n`, lone `\r` and bare `\n` in `text` to `target`.
///
/// Borrows when the text already uses `target` exclusively.
pub fn convert_line_endings(text: &str, target: LineEnding) -> Cow<'_, str> {
    let counts = EolCounts::scan(text.as_bytes());
    let already = match target {
        LineEnding::Crlf => counts.unix_lf == 0 && counts.missing_lf == 0,
        LineEnding::Lf => counts.windows_cr == 0,
    };
    if already {
        return Cow::Borrowed(text);
    }

    let mut result = String::with_capacity(text.len() + counts.unix_lf as usize);
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                result.push_str(target.as_str());
            }
            '\n' => result.push_str(target.as_str()),
            other => result.push(other),
        }
    }
    Cow::Owned(result)
}
