use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use quill_config::Config;
use quill_session::{EditorSession, FileReadEvent, SessionEvent, TextBuffer, TextSurface};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

mod logging;

use logging::{LogConfig, init_logging};

type Session = EditorSession<TextBuffer, UnboundedSender<FileReadEvent>>;

/// Load a text file, report its line endings and optionally save a copy.
#[derive(Debug, Parser)]
#[command(name = "quill", version, about)]
struct Cli {
    /// File to load
    file: PathBuf,

    /// Charset used to decode and encode the file
    #[arg(long, value_name = "NAME")]
    charset: Option<String>,

    /// Open as binary (every byte maps to one character)
    #[arg(long, conflicts_with = "charset")]
    binary: bool,

    /// Save the loaded text to another path
    #[arg(long, value_name = "PATH")]
    save_as: Option<PathBuf>,

    /// Config file to use instead of the search paths
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose));

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session: Session =
        EditorSession::new("cli", Some(cli.file.clone()), &config, TextBuffer::new(), tx)
            .map_err(|e| anyhow!(e.user_message()))?;

    if let Some(name) = &cli.charset {
        session
            .set_charset(name)
            .map_err(|e| anyhow!(e.user_message()))?;
    }

    let opened = if cli.binary {
        session.open_file_binary()
    } else {
        session.open_file()
    };
    opened.map_err(|e| anyhow!(e.user_message()))?;

    let events = drive(&mut session).await;
    report_load(&session, &events, &mut rx)?;

    if let Some(target) = &cli.save_as {
        session
            .save_file_as(target)
            .map_err(|e| anyhow!(e.user_message()))?;
        let events = drive(&mut session).await;
        report_save(&events)?;
    }

    Ok(())
}

/// Process session events until no job runs. Ctrl-C cancels the running job.
async fn drive(session: &mut Session) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    let mut interrupted = false;
    let mut cancelled = false;

    while session.is_busy() {
        tokio::select! {
            event = session.next_event() => match event {
                Some(event) => events.push(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
            }
        }
        if interrupted && !cancelled {
            warn!("Interrupted, cancelling");
            session.cancel();
            cancelled = true;
        }
    }
    events
}

fn report_load(
    session: &Session,
    events: &[SessionEvent],
    rx: &mut UnboundedReceiver<FileReadEvent>,
) -> Result<()> {
    match events.last() {
        Some(SessionEvent::Loaded { eol, bytes, lines }) => {
            let charset = rx
                .try_recv()
                .map(|event| event.charset)
                .unwrap_or_else(|_| session.file_charset().name().to_string());
            println!("{}", session.handle().display());
            println!("  line endings: {eol}");
            println!("  charset:      {charset}");
            println!("  bytes:        {bytes}");
            println!("  lines:        {lines}");
            if let Some(status) = session.surface().status() {
                info!("{}", status.1);
            }
            Ok(())
        }
        Some(SessionEvent::LoadCancelled { bytes }) => {
            bail!("load cancelled after {bytes} bytes")
        }
        Some(SessionEvent::LoadFailed { message }) => bail!("{message}"),
        other => bail!("load ended without a result: {other:?}"),
    }
}

fn report_save(events: &[SessionEvent]) -> Result<()> {
    match events.last() {
        Some(SessionEvent::SaveFinished(outcome)) => {
            if let Some(Err(message)) = &outcome.backup {
                warn!("Backup failed: {}", message);
            }
            if outcome.unmappable_chars > 0 {
                warn!(
                    "{} characters could not be encoded and were written as '?'",
                    outcome.unmappable_chars
                );
            }
            if !outcome.success() {
                bail!("{}", outcome.message);
            }
            println!("{}", outcome.message);
            Ok(())
        }
        Some(SessionEvent::SaveFailed { message }) => bail!("{message}"),
        other => bail!("save ended without a result: {other:?}"),
    }
}
