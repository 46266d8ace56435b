//! Background load and save workers.
//!
//! Each worker runs the blocking `quill_fs` call on the blocking pool and
//! reports progress over the session's event channel. A supervising task
//! awaits the blocking handle and sends exactly one terminal event, also when
//! the worker panicked, so the channel order is always progress first and the
//! terminal event last.

use std::path::PathBuf;

use quill_fs::{
    BackupRotator, CancellationFlag, Charset, LoadConfig, LoadResult, ProgressUpdate, SaveConfig,
    SaveOutcome, SaveTarget, load_file, save_file,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::error;

/// Kind of background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Load,
    Save,
}

#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Progress { job: Job, update: ProgressUpdate },
    Loaded(LoadResult),
    Saved(SaveOutcome),
    /// The worker could not produce a result at all.
    Failed { job: Job, message: String },
}

pub(crate) fn spawn_load(
    events: UnboundedSender<WorkerEvent>,
    path: PathBuf,
    charset: Charset,
    config: LoadConfig,
    cancel: CancellationFlag,
) {
    let progress = events.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let mut sink = |update: ProgressUpdate| {
            let _ = progress.send(WorkerEvent::Progress {
                job: Job::Load,
                update,
            });
        };
        load_file(&path, charset, &config, &mut sink, &cancel).map_err(|err| {
            match err.suggestion() {
                Some(hint) => format!("{}\n{hint}", err.user_message()),
                None => err.user_message(),
            }
        })
    });

    tokio::spawn(async move {
        let event = match worker.await {
            Ok(Ok(result)) => WorkerEvent::Loaded(result),
            Ok(Err(message)) => WorkerEvent::Failed {
                job: Job::Load,
                message,
            },
            Err(e) => {
                error!("Load worker panicked: {}", e);
                WorkerEvent::Failed {
                    job: Job::Load,
                    message: format!("File loading stopped unexpectedly: {e}"),
                }
            }
        };
        let _ = events.send(event);
    });
}

pub(crate) struct SaveJob {
    pub target: SaveTarget,
    pub text: String,
    pub charset: Charset,
    pub config: SaveConfig,
    pub rotator: BackupRotator,
    pub cancel: CancellationFlag,
}

pub(crate) fn spawn_save(events: UnboundedSender<WorkerEvent>, job: SaveJob) {
    let progress = events.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let SaveJob {
            target,
            text,
            charset,
            config,
            rotator,
            cancel,
        } = job;
        let mut sink = |update: ProgressUpdate| {
            let _ = progress.send(WorkerEvent::Progress {
                job: Job::Save,
                update,
            });
        };
        save_file(&target, &text, charset, &config, &rotator, &mut sink, &cancel)
    });

    tokio::spawn(async move {
        let event = match worker.await {
            Ok(outcome) => WorkerEvent::Saved(outcome),
            Err(e) => {
                error!("Save worker panicked: {}", e);
                WorkerEvent::Failed {
                    job: Job::Save,
                    message: format!("File saving stopped unexpectedly: {e}"),
                }
            }
        };
        let _ = events.send(event);
    });
}
