//! Editor session orchestration for quill.
//!
//! An [`EditorSession`] owns one file handle, a [`TextSurface`] showing its
//! text and the background workers that load and save it.

mod error;
mod event;
pub mod search;
mod session;
mod surface;
mod worker;

pub use error::{SessionError, SessionResult};
pub use event::{FileEventTarget, FileReadEvent};
pub use session::{EditorSession, LoadState, SaveState, SessionEvent};
pub use surface::{MessageType, TextBuffer, TextSurface};
pub use worker::Job;
