//! Editor session: one file, its text surface and its background workers.
//!
//! Loads follow `Idle -> Loading -> (Idle | Failed)` and saves follow
//! `Idle -> Saving -> Idle`. Workers only ever send events; every state change
//! happens in the transition functions below, called from
//! [`EditorSession::next_event`] or [`EditorSession::poll_events`] on the
//! thread that owns the session.
//!
//! Starting a load or a save spawns Tokio tasks, so those calls must be made
//! from within a Tokio runtime.

use std::fs;
use std::path::PathBuf;

use quill_config::{Config, FontSettings};
use quill_fs::{
    BackupConfig, BackupRotator, CancellationFlag, Charset, EolClassification, FileHandle,
    FsError, LineEnding, LoadConfig, LoadResult, LoadStatus, ProgressUpdate, SaveConfig,
    SaveOutcome, SaveStatus, check_load_path, check_save_target,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::event::{FileEventTarget, FileReadEvent};
use crate::search;
use crate::surface::{MessageType, TextSurface};
use crate::worker::{self, Job, SaveJob, WorkerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    /// The last load failed; the surface shows the error read-only.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Saving,
}

/// What a processed worker event did to the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Progress {
        job: Job,
        update: ProgressUpdate,
    },
    Loaded {
        eol: EolClassification,
        bytes: u64,
        lines: u64,
    },
    LoadCancelled {
        bytes: u64,
    },
    LoadFailed {
        message: String,
    },
    SaveFinished(SaveOutcome),
    SaveFailed {
        message: String,
    },
}

/// A save waiting for the running one to finish.
#[derive(Debug, Clone)]
struct SaveRequest {
    path: PathBuf,
    /// Point the session at `path` once the save starts
    repath: bool,
}

pub struct EditorSession<S, T> {
    id: String,
    handle: FileHandle,
    /// Charset for the next [`EditorSession::open_file`]
    charset: Charset,
    /// Charset the shown text was loaded with; saves encode with it
    file_charset: Charset,
    line_ending: Option<LineEnding>,
    text_wrap: bool,
    font: FontSettings,
    load_config: LoadConfig,
    save_config: SaveConfig,
    backup_config: BackupConfig,
    surface: S,
    target: T,
    modified: bool,
    eol: Option<EolClassification>,
    load_state: LoadState,
    save_state: SaveState,
    load_cancel: Option<CancellationFlag>,
    save_cancel: Option<CancellationFlag>,
    pending_save: Option<SaveRequest>,
    progress: Option<ProgressUpdate>,
    events_tx: UnboundedSender<WorkerEvent>,
    events_rx: UnboundedReceiver<WorkerEvent>,
}

impl<S: TextSurface, T: FileEventTarget> EditorSession<S, T> {
    /// Create a session for `path` (`None` for a new, unsaved file).
    ///
    /// Fails when the configured default charset cannot be resolved.
    pub fn new(
        id: impl Into<String>,
        path: Option<PathBuf>,
        config: &Config,
        mut surface: S,
        target: T,
    ) -> SessionResult<Self> {
        let charset = config.charset()?;
        surface.set_wrap(config.editor.text_wrap);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            id: id.into(),
            handle: FileHandle::new(path),
            charset,
            file_charset: charset,
            line_ending: config.editor.line_ending.line_ending(),
            text_wrap: config.editor.text_wrap,
            font: config.editor.font.clone(),
            load_config: config.load_config(),
            save_config: config.save_config(),
            backup_config: config.backup_config(),
            surface,
            target,
            modified: false,
            eol: None,
            load_state: LoadState::Idle,
            save_state: SaveState::Idle,
            load_cancel: None,
            save_cancel: None,
            pending_save: None,
            progress: None,
            events_tx,
            events_rx,
        })
    }

    // ---------------------------------------------------------------------
    // Load
    // ---------------------------------------------------------------------

    /// Start loading the file with the session charset.
    ///
    /// Path problems are reported here, before any worker starts.
    pub fn open_file(&mut self) -> SessionResult<()> {
        self.start_load(self.charset)
    }

    /// Load the file with a charset that maps every byte to one character,
    /// so a later save writes the same bytes back. Only this load and the
    /// saves of its text use the binary charset.
    pub fn open_file_binary(&mut self) -> SessionResult<()> {
        self.start_load(Charset::binary())
    }

    fn start_load(&mut self, charset: Charset) -> SessionResult<()> {
        self.ensure_idle()?;
        let path = self.handle.path().ok_or(FsError::NoPath)?.to_path_buf();
        if let Err(err) = check_load_path(&path, self.load_config.max_file_size) {
            error!(session = %self.id, path = %path.display(), error = %err, "could not open file");
            self.surface.show_status(MessageType::Error, &err.user_message());
            return Err(err.into());
        }

        let cancel = CancellationFlag::new();
        self.load_cancel = Some(cancel.clone());
        self.load_state = LoadState::Loading;
        self.file_charset = charset;
        self.progress = None;
        self.surface.set_editable(false);
        self.surface.set_progress(0.0);
        self.surface
            .show_status(MessageType::Info, &format!("Loading {}", path.display()));
        info!(session = %self.id, path = %path.display(), charset = %charset, "load started");

        worker::spawn_load(
            self.events_tx.clone(),
            path,
            charset,
            self.load_config.clone(),
            cancel,
        );
        Ok(())
    }

    fn on_load_finished(&mut self, result: LoadResult) -> SessionEvent {
        self.load_cancel = None;
        self.surface.set_progress(1.0);
        let LoadResult {
            text,
            byte_count,
            eol,
            line_count,
            malformed_sequence_count,
            replaced_spans,
            status,
            ..
        } = result;

        match status {
            LoadStatus::Completed => {
                if malformed_sequence_count > 0 || replaced_spans > 0 {
                    warn!(
                        session = %self.id,
                        malformed = malformed_sequence_count,
                        replaced_spans,
                        "file loaded with irregular content"
                    );
                }
                self.surface.set_text(text);
                self.surface.set_editable(true);
                self.modified = false;
                self.eol = Some(eol);
                self.load_state = LoadState::Idle;
                self.surface.show_status(
                    MessageType::Success,
                    &format!("File Loaded ({byte_count} bytes). {}", eol.label()),
                );
                self.target.file_read(FileReadEvent {
                    session_id: self.id.clone(),
                    eol,
                    charset: self.file_charset.name().to_string(),
                });
                SessionEvent::Loaded {
                    eol,
                    bytes: byte_count,
                    lines: line_count,
                }
            }
            LoadStatus::Cancelled => {
                info!(session = %self.id, bytes = byte_count, "load cancelled");
                self.surface.set_text(text);
                self.surface.set_editable(true);
                self.modified = false;
                self.load_state = LoadState::Idle;
                self.surface.show_status(MessageType::Warning, "Cancelled");
                SessionEvent::LoadCancelled { bytes: byte_count }
            }
            LoadStatus::Failed(message) => self.on_load_failed(message),
        }
    }

    fn on_load_failed(&mut self, message: String) -> SessionEvent {
        error!(session = %self.id, path = %self.handle.display(), "{}", message);
        self.load_cancel = None;
        self.surface.set_text(message.clone());
        self.surface.set_editable(false);
        self.modified = false;
        self.eol = None;
        self.load_state = LoadState::Failed;
        self.surface.show_status(MessageType::Error, &message);
        SessionEvent::LoadFailed { message }
    }

    // ---------------------------------------------------------------------
    // Save
    // ---------------------------------------------------------------------

    /// Save the surface text to the session path.
    ///
    /// While another save runs the request is queued and started once the
    /// running save ends; only the latest queued request is kept.
    ///
    /// Refused after a failed load, where the surface shows the error
    /// instead of the file content.
    pub fn save_file(&mut self) -> SessionResult<()> {
        let path = self.handle.path().ok_or(FsError::NoPath)?.to_path_buf();
        if self.load_state == LoadState::Failed {
            return Err(SessionError::LoadFailed);
        }
        self.start_save(SaveRequest {
            path,
            repath: false,
        })
    }

    /// Save to `path` and make it the session path once the save starts.
    ///
    /// A refused save leaves the session path unchanged. After a failed load
    /// only a different path is accepted.
    pub fn save_file_as(&mut self, path: impl Into<PathBuf>) -> SessionResult<()> {
        let path = path.into();
        if self.load_state == LoadState::Failed && self.handle.path() == Some(path.as_path()) {
            return Err(SessionError::LoadFailed);
        }
        self.start_save(SaveRequest { path, repath: true })
    }

    fn start_save(&mut self, request: SaveRequest) -> SessionResult<()> {
        if self.load_state == LoadState::Loading {
            return Err(SessionError::LoadInProgress);
        }
        if self.save_state == SaveState::Saving {
            debug!(session = %self.id, path = %request.path.display(), "save queued behind running save");
            self.pending_save = Some(request);
            return Ok(());
        }

        let SaveRequest { path, repath } = request;

        let target = match check_save_target(&path) {
            Ok(target) => target,
            Err(err) => {
                error!(session = %self.id, path = %path.display(), error = %err, "could not save file");
                self.surface.show_status(MessageType::Error, &err.user_message());
                return Err(err.into());
            }
        };
        if repath {
            self.handle.set_path(Some(path.clone()));
        }

        let cancel = CancellationFlag::new();
        self.save_cancel = Some(cancel.clone());
        self.save_state = SaveState::Saving;
        self.progress = None;
        self.surface.set_progress(0.0);
        self.surface
            .show_status(MessageType::Info, &format!("Saving {}", path.display()));
        info!(session = %self.id, path = %path.display(), charset = %self.file_charset, "save started");

        let config = SaveConfig {
            line_ending: self.line_ending,
            ..self.save_config.clone()
        };
        worker::spawn_save(
            self.events_tx.clone(),
            SaveJob {
                target,
                text: self.surface.text().to_string(),
                charset: self.file_charset,
                config,
                rotator: BackupRotator::new(self.backup_config.clone()),
                cancel,
            },
        );
        Ok(())
    }

    fn on_save_finished(&mut self, outcome: SaveOutcome) -> SessionEvent {
        self.save_cancel = None;
        self.save_state = SaveState::Idle;
        self.surface.set_progress(1.0);

        if let Some(Err(message)) = &outcome.backup {
            self.surface
                .show_status(MessageType::Warning, &format!("Backup failed: {message}"));
        }
        let kind = match outcome.status {
            SaveStatus::Completed => {
                self.modified = false;
                MessageType::Success
            }
            SaveStatus::Cancelled => MessageType::Warning,
            SaveStatus::Failed(_) => MessageType::Error,
        };
        self.surface.show_status(kind, &outcome.message);

        self.start_pending_save();
        SessionEvent::SaveFinished(outcome)
    }

    fn on_save_failed(&mut self, message: String) -> SessionEvent {
        error!(session = %self.id, "{}", message);
        self.save_cancel = None;
        self.save_state = SaveState::Idle;
        self.surface.show_status(MessageType::Error, &message);
        self.start_pending_save();
        SessionEvent::SaveFailed { message }
    }

    fn start_pending_save(&mut self) {
        if let Some(request) = self.pending_save.take() {
            if let Err(err) = self.start_save(request) {
                warn!(session = %self.id, error = %err, "queued save could not start");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Wait for the next worker event and apply it.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    /// Apply every worker event that has already arrived.
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut applied = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            applied.push(self.apply(event));
        }
        applied
    }

    /// Drive events until no load or save is running.
    pub async fn wait_idle(&mut self) -> Vec<SessionEvent> {
        let mut applied = Vec::new();
        while self.is_busy() {
            match self.next_event().await {
                Some(event) => applied.push(event),
                None => break,
            }
        }
        applied
    }

    fn apply(&mut self, event: WorkerEvent) -> SessionEvent {
        match event {
            WorkerEvent::Progress { job, update } => {
                self.surface.set_progress(update.fraction());
                self.surface.show_status(MessageType::Info, &update.message);
                self.progress = Some(update.clone());
                SessionEvent::Progress { job, update }
            }
            WorkerEvent::Loaded(result) => self.on_load_finished(result),
            WorkerEvent::Saved(outcome) => self.on_save_finished(outcome),
            WorkerEvent::Failed {
                job: Job::Load,
                message,
            } => self.on_load_failed(message),
            WorkerEvent::Failed {
                job: Job::Save,
                message,
            } => self.on_save_failed(message),
        }
    }

    /// Ask running workers to stop. They finish with a cancelled status.
    pub fn cancel(&mut self) {
        for flag in [&self.load_cancel, &self.save_cancel].into_iter().flatten() {
            flag.cancel();
        }
        self.pending_save = None;
    }

    // ---------------------------------------------------------------------
    // Content
    // ---------------------------------------------------------------------

    /// Record a user edit. Ignored while a load or save runs.
    ///
    /// Returns whether the modified flag was set.
    pub fn notify_content_changed(&mut self) -> bool {
        if self.notifications_suspended() {
            return false;
        }
        self.modified = true;
        true
    }

    /// Apply an edit to the surface and record it.
    ///
    /// Refused while a worker runs and after a failed load.
    pub fn edit<F: FnOnce(&mut S)>(&mut self, f: F) -> SessionResult<()> {
        self.ensure_editable()?;
        f(&mut self.surface);
        self.notify_content_changed();
        Ok(())
    }

    fn notifications_suspended(&self) -> bool {
        self.load_state == LoadState::Loading || self.save_state == SaveState::Saving
    }

    fn ensure_idle(&self) -> SessionResult<()> {
        if self.load_state == LoadState::Loading {
            return Err(SessionError::LoadInProgress);
        }
        if self.save_state == SaveState::Saving {
            return Err(SessionError::SaveInProgress);
        }
        Ok(())
    }

    fn ensure_editable(&self) -> SessionResult<()> {
        self.ensure_idle()?;
        if self.load_state == LoadState::Failed {
            return Err(SessionError::LoadFailed);
        }
        Ok(())
    }

    /// Clear the surface. The session keeps its path so the file can be
    /// opened again. Refused while a worker runs.
    pub fn close_file(&mut self) -> SessionResult<()> {
        self.ensure_idle()?;
        self.surface.set_text(String::new());
        self.surface.set_editable(true);
        self.modified = false;
        self.eol = None;
        self.load_state = LoadState::Idle;
        self.file_charset = self.charset;
        Ok(())
    }

    /// Size of the file on disk.
    pub fn file_size(&self) -> SessionResult<u64> {
        let path = self.handle.path().ok_or(FsError::NoPath)?;
        let metadata = fs::metadata(path).map_err(|source| FsError::Io {
            operation: "inspect",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(metadata.len())
    }

    /// Count occurrences of `needle` (`all`), or find the next one from the
    /// caret and move the caret past it. Returns the number found.
    pub fn find(&mut self, needle: &str, all: bool) -> usize {
        let text = self.surface.text();
        if all {
            return search::count_occurrences(text, needle);
        }
        match search::find_from(text, needle, self.surface.caret()) {
            Some(pos) => {
                self.surface.set_caret(pos + needle.len());
                1
            }
            None => 0,
        }
    }

    /// Replace the next occurrence from the caret. Returns the number replaced.
    pub fn replace(&mut self, needle: &str, replacement: &str) -> SessionResult<usize> {
        self.ensure_editable()?;
        let Some((text, pos)) =
            search::replace_from(self.surface.text(), needle, replacement, self.surface.caret())
        else {
            return Ok(0);
        };
        self.surface.set_text(text);
        self.surface.set_caret(pos + replacement.len());
        self.notify_content_changed();
        Ok(1)
    }

    /// Replace every occurrence. Returns the number replaced.
    pub fn replace_all(&mut self, needle: &str, replacement: &str) -> SessionResult<usize> {
        self.ensure_editable()?;
        let (text, count) = search::replace_all(self.surface.text(), needle, replacement);
        if count > 0 {
            self.surface.set_text(text);
            self.notify_content_changed();
        }
        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Unsaved changes. Always false for a session without a path.
    pub fn is_modified(&self) -> bool {
        self.handle.path().is_some() && self.modified
    }

    pub fn eol(&self) -> Option<EolClassification> {
        self.eol
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn save_state(&self) -> SaveState {
        self.save_state
    }

    pub fn is_busy(&self) -> bool {
        self.load_state == LoadState::Loading || self.save_state == SaveState::Saving
    }

    pub fn has_pending_save(&self) -> bool {
        self.pending_save.is_some()
    }

    /// Last progress update of the running or last finished job.
    pub fn progress(&self) -> Option<&ProgressUpdate> {
        self.progress.as_ref()
    }

    /// Charset used by [`EditorSession::open_file`].
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Charset of the text currently shown, used when saving it.
    pub fn file_charset(&self) -> Charset {
        self.file_charset
    }

    /// Charset for the next load and save.
    pub fn set_charset(&mut self, name: &str) -> SessionResult<()> {
        let charset = Charset::resolve(name)?;
        self.charset = charset;
        self.file_charset = charset;
        Ok(())
    }

    pub fn line_ending(&self) -> Option<LineEnding> {
        self.line_ending
    }

    /// Line ending the next save converts to; `None` writes the text as is.
    pub fn set_line_ending(&mut self, line_ending: Option<LineEnding>) {
        self.line_ending = line_ending;
    }

    pub fn text_wrap(&self) -> bool {
        self.text_wrap
    }

    pub fn set_text_wrap(&mut self, wrap: bool) {
        self.text_wrap = wrap;
        self.surface.set_wrap(wrap);
    }

    pub fn font(&self) -> &FontSettings {
        &self.font
    }

    pub fn set_font(&mut self, font: FontSettings) {
        self.font = font;
    }
}
