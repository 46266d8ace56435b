//! Charset resolution and the per-span decoder / streaming encoder used by the
//! loader and saver.
//!
//! Charsets are looked up by label in the `encoding_rs` registry. Only
//! ASCII-compatible encodings are accepted: the loader finds line boundaries by
//! looking for raw `0x0D`/`0x0A` bytes, which is meaningless for UTF-16 or
//! ISO-2022-JP byte streams.

use std::fmt;

use encoding_rs::{EncoderResult, Encoding};

use crate::error::{FsError, FsResult};

/// Substitute written for characters the target charset cannot represent.
const UNMAPPABLE_SUBSTITUTE: u8 = b'?';

/// A resolved, ASCII-compatible text encoding.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Charset {
    encoding: &'static Encoding,
}

impl Charset {
    /// Resolve a charset label such as `"UTF-8"`, `"latin1"` or `"windows-1251"`.
    pub fn resolve(label: &str) -> FsResult<Self> {
        let encoding =
            Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| FsError::UnknownCharset {
                name: label.to_string(),
            })?;
        if !encoding.is_ascii_compatible() {
            return Err(FsError::UnsupportedCharset {
                name: label.to_string(),
            });
        }
        Ok(Charset { encoding })
    }

    pub fn utf8() -> Self {
        Charset {
            encoding: encoding_rs::UTF_8,
        }
    }

    /// Single-byte charset where every byte maps to exactly one character and
    /// encodes back to the same byte. Used to open files "as binary".
    pub fn binary() -> Self {
        Charset {
            encoding: encoding_rs::WINDOWS_1252,
        }
    }

    /// Canonical name of the charset.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decode one span of bytes and append it to `out`.
    ///
    /// Malformed sequences are replaced with U+FFFD; returns `true` when at
    /// least one replacement happened. No BOM sniffing is done, a leading BOM
    /// is kept as U+FEFF so the text saves back to the same bytes.
    pub fn decode_into(&self, bytes: &[u8], out: &mut String) -> bool {
        let (text, had_errors) = self.encoding.decode_without_bom_handling(bytes);
        out.push_str(&text);
        had_errors
    }

    /// Start a streaming encoder for a save.
    pub fn encoder(&self) -> TextEncoder {
        TextEncoder {
            inner: self.encoding.new_encoder(),
            unmappable: 0,
        }
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Charset").field(&self.name()).finish()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Streaming UTF-8 to charset encoder.
///
/// Keeps encoder state between slices so a save can be written in several
/// parts. Unmappable characters are written as `?` and counted.
pub struct TextEncoder {
    inner: encoding_rs::Encoder,
    unmappable: usize,
}

impl TextEncoder {
    /// Encode `src` and append the bytes to `dst`. `last` marks the final slice.
    pub fn encode_into(&mut self, mut src: &str, dst: &mut Vec<u8>, last: bool) {
        loop {
            let needed = self
                .inner
                .max_buffer_length_from_utf8_without_replacement(src.len())
                .unwrap_or(src.len() * 4 + 16);
            dst.reserve(needed);
            let (result, read) =
                self.inner
                    .encode_from_utf8_to_vec_without_replacement(src, dst, last);
            src = &src[read..];
            match result {
                EncoderResult::InputEmpty => break,
                EncoderResult::OutputFull => continue,
                EncoderResult::Unmappable(_) => {
                    dst.push(UNMAPPABLE_SUBSTITUTE);
                    self.unmappable += 1;
                }
            }
        }
    }

    /// Characters replaced by `?` so far.
    pub fn unmappable(&self) -> usize {
        self.unmappable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_labels() {
        assert_eq!(Charset::resolve("UTF-8").unwrap().name(), "UTF-8");
        assert_eq!(Charset::resolve("utf8").unwrap().name(), "UTF-8");
        assert_eq!(Charset::resolve(" latin1 ").unwrap().name(), "windows-1252");
        assert_eq!(Charset::resolve("cp1251").unwrap().name(), "windows-1251");
    }

    #[test]
    fn test_unknown_charset_fails_fast() {
        let err = Charset::resolve("klingon-8").unwrap_err();
        assert!(matches!(err, FsError::UnknownCharset { .. }));
    }

    #[test]
    fn test_non_ascii_compatible_rejected() {
        let err = Charset::resolve("UTF-16LE").unwrap_err();
        assert!(matches!(err, FsError::UnsupportedCharset { .. }));
        let err = Charset::resolve("iso-2022-jp").unwrap_err();
        assert!(matches!(err, FsError::UnsupportedCharset { .. }));
    }

    #[test]
    fn test_decode_replaces_malformed() {
        let mut out = String::new();
        let had_errors = Charset::utf8().decode_into(b"ok\xFF\n", &mut out);
        assert!(had_errors);
        assert_eq!(out, "ok\u{FFFD}\n");
    }

    #[test]
    fn test_decode_keeps_bom() {
        let mut out = String::new();
        Charset::utf8().decode_into(b"\xEF\xBB\xBFhi", &mut out);
        assert_eq!(out, "\u{FEFF}hi");
    }

    #[test]
    fn test_binary_charset_is_total() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        let mut text = String::new();
        let had_errors = Charset::binary().decode_into(&bytes, &mut text);
        assert!(!had_errors);
        assert_eq!(text.chars().count(), 256);

        let mut encoder = Charset::binary().encoder();
        let mut back = Vec::new();
        encoder.encode_into(&text, &mut back, true);
        assert_eq!(back, bytes);
        assert_eq!(encoder.unmappable(), 0);
    }

    #[test]
    fn test_encode_unmappable_substituted() {
        let charset = Charset::resolve("windows-1252").unwrap();
        let mut encoder = charset.encoder();
        let mut out = Vec::new();
        encoder.encode_into("a\u{4E2D}b", &mut out, false);
        encoder.encode_into("é", &mut out, true);
        assert_eq!(out, b"a?b\xE9");
        assert_eq!(encoder.unmappable(), 1);
    }
}
