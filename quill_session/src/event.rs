//! Notification sent to the surrounding application when a file was read.

use quill_fs::EolClassification;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Emitted once per successfully completed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReadEvent {
    pub session_id: String,
    pub eol: EolClassification,
    /// Canonical charset name
    pub charset: String,
}

/// Receiver of [`FileReadEvent`]s, typically the tab container.
pub trait FileEventTarget {
    fn file_read(&mut self, event: FileReadEvent);
}

impl FileEventTarget for UnboundedSender<FileReadEvent> {
    fn file_read(&mut self, event: FileReadEvent) {
        if self.send(event).is_err() {
            debug!("file read listener is gone");
        }
    }
}

impl FileEventTarget for Vec<FileReadEvent> {
    fn file_read(&mut self, event: FileReadEvent) {
        self.push(event);
    }
}
