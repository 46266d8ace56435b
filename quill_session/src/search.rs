//! Find and replace over the session text. Offsets are byte offsets.

/// Non-overlapping occurrences of `needle` in `haystack`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// First occurrence of `needle` at or after `from`, wrapping around to the
/// start of the text when there is none.
pub fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let from = floor_char_boundary(haystack, from);
    haystack[from..]
        .find(needle)
        .map(|pos| pos + from)
        .or_else(|| haystack.find(needle))
}

/// Replace the occurrence [`find_from`] would return.
///
/// Returns the new text and the offset of the replacement.
pub fn replace_from(
    haystack: &str,
    needle: &str,
    replacement: &str,
    from: usize,
) -> Option<(String, usize)> {
    let pos = find_from(haystack, needle, from)?;
    let mut text = String::with_capacity(haystack.len() + replacement.len());
    text.push_str(&haystack[..pos]);
    text.push_str(replacement);
    text.push_str(&haystack[pos + needle.len()..]);
    Some((text, pos))
}

/// Replace every occurrence in one pass. A replacement that contains the
/// needle is not searched again.
pub fn replace_all(haystack: &str, needle: &str, replacement: &str) -> (String, usize) {
    let count = count_occurrences(haystack, needle);
    if count == 0 {
        return (haystack.to_string(), 0);
    }
    (haystack.replace(needle, replacement), count)
}

fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
