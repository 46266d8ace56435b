//! The text surface a session displays its file in.

/// Kind of a status message, used for colour coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Info,
    Success,
    Warning,
    Error,
}

/// Display widget holding the decoded text.
///
/// The session is the only writer of the text while a load is applied; user
/// edits made through the surface must be reported back with
/// `EditorSession::notify_content_changed`.
pub trait TextSurface {
    fn set_text(&mut self, text: String);
    fn text(&self) -> &str;
    fn set_editable(&mut self, editable: bool);
    fn is_editable(&self) -> bool;
    /// Caret position as a byte offset into [`TextSurface::text`].
    fn caret(&self) -> usize;
    fn set_caret(&mut self, offset: usize);
    fn show_status(&mut self, kind: MessageType, message: &str);

    /// Progress of the running load or save, in `[0, 1]`.
    fn set_progress(&mut self, _fraction: f64) {}

    fn set_wrap(&mut self, _wrap: bool) {}
}

/// In-memory text surface.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    content: String,
    editable: bool,
    caret: usize,
    wrap: bool,
    progress: f64,
    /// Every status message shown, oldest first
    statuses: Vec<(MessageType, String)>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            content: String::new(),
            editable: true,
            caret: 0,
            wrap: false,
            progress: 0.0,
            statuses: Vec::new(),
        }
    }

    /// Insert text at the caret and move the caret past it.
    pub fn insert_str(&mut self, text: &str) {
        if !self.editable {
            return;
        }
        self.content.insert_str(self.caret, text);
        self.caret += text.len();
    }

    /// Delete the character after the caret.
    pub fn delete_char(&mut self) {
        if !self.editable || self.caret >= self.content.len() {
            return;
        }
        self.content.remove(self.caret);
    }

    /// Delete the character before the caret.
    pub fn backspace(&mut self) {
        if !self.editable || self.caret == 0 {
            return;
        }
        let prev = self.content[..self.caret]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.content.remove(prev);
        self.caret = prev;
    }

    pub fn line_count(&self) -> usize {
        if self.content.is_empty() {
            0
        } else {
            self.content.lines().count()
        }
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrap
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Most recent status message.
    pub fn status(&self) -> Option<&(MessageType, String)> {
        self.statuses.last()
    }

    pub fn statuses(&self) -> &[(MessageType, String)] {
        &self.statuses
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSurface for TextBuffer {
    fn set_text(&mut self, text: String) {
        self.content = text;
        self.caret = 0;
    }

    fn text(&self) -> &str {
        &self.content
    }

    fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    fn is_editable(&self) -> bool {
        self.editable
    }

    fn caret(&self) -> usize {
        self.caret
    }

    fn set_caret(&mut self, offset: usize) {
        let mut offset = offset.min(self.content.len());
        while !self.content.is_char_boundary(offset) {
            offset -= 1;
        }
        self.caret = offset;
    }

    fn show_status(&mut self, kind: MessageType, message: &str) {
        self.statuses.push((kind, message.to_string()));
    }

    fn set_progress(&mut self, fraction: f64) {
        self.progress = fraction;
    }

    fn set_wrap(&mut self, wrap: bool) {
        self.wrap = wrap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_delete() {
        let mut buffer = TextBuffer::new();
        buffer.insert_str("héllo");
        assert_eq!(buffer.text(), "héllo");
        assert_eq!(buffer.caret(), "héllo".len());

        buffer.backspace();
        assert_eq!(buffer.text(), "héll");
        buffer.set_caret(1);
        buffer.delete_char();
        assert_eq!(buffer.text(), "hll");
    }

    #[test]
    fn test_caret_snaps_to_char_boundary() {
        let mut buffer = TextBuffer::new();
        buffer.set_text("aé".to_string());
        buffer.set_caret(2);
        assert_eq!(buffer.caret(), 1);
        buffer.set_caret(100);
        assert_eq!(buffer.caret(), 3);
    }

    #[test]
    fn test_read_only_ignores_edits() {
        let mut buffer = TextBuffer::new();
        buffer.set_text("fixed".to_string());
        buffer.set_editable(false);
        buffer.insert_str("x");
        buffer.delete_char();
        assert_eq!(buffer.text(), "fixed");
    }

    #[test]
    fn test_status_history() {
        let mut buffer = TextBuffer::new();
        buffer.show_status(MessageType::Info, "one");
        buffer.show_status(MessageType::Error, "two");
        assert_eq!(buffer.statuses().len(), 2);
        assert_eq!(buffer.status(), Some(&(MessageType::Error, "two".to_string())));
        assert_eq!(buffer.line_count(), 0);
    }
}
