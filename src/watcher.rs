//! The watch session: notify wiring and the keep-alive loop.
//!
//! Raw [`notify`] events are bridged from the watcher's callback thread over
//! an mpsc channel and consumed strictly one at a time by [`WatchSession::run`],
//! which translates them into [`FileEvent`]s for the dispatcher. Processing
//! one event at a time means no shared state needs locking; a long stability
//! wait simply delays the events queued behind it.
//!
//! Only the top level of the watch root is observed. Activity inside
//! subdirectories (including destination folders that live under the root)
//! does not generate events, so organized files are not re-examined.

use crate::dispatcher::{EventDispatcher, FileEvent};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{info, trace, warn};

/// Errors that can occur while establishing or running the watch. Unlike
/// per-event errors these are fatal: without a working watch there is no
/// session.
#[derive(Debug)]
pub enum WatchError {
    /// The watch root does not exist or is not a directory.
    InvalidRoot(PathBuf),
    /// The underlying notification mechanism failed.
    Notify(notify::Error),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::InvalidRoot(path) => {
                write!(f, "Watch root is not a directory: {}", path.display())
            }
            WatchError::Notify(e) => write!(f, "File watch failed: {}", e),
        }
    }
}

impl std::error::Error for WatchError {}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::Notify(e)
    }
}

/// A single watch over one directory, feeding events to a dispatcher.
pub struct WatchSession {
    root: PathBuf,
    poll_interval: Duration,
    dispatcher: EventDispatcher,
}

impl WatchSession {
    /// Creates a session over `root`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidRoot`] if `root` is not an existing
    /// directory. This is the one startup-fatal validation; everything after
    /// it is recoverable per event.
    pub fn new(
        root: PathBuf,
        poll_interval: Duration,
        dispatcher: EventDispatcher,
    ) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::InvalidRoot(root));
        }
        Ok(Self {
            root,
            poll_interval,
            dispatcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts the watch and blocks, handling events until the watcher goes
    /// away. The receive timeout doubles as the keep-alive tick.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the watcher cannot be created or
    /// attached to the root.
    pub fn run(&self) -> Result<(), WatchError> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| {
                let _ = tx.send(res);
            },
        )?;
        watcher.watch(&self.root, RecursiveMode::NonRecursive)?;
        info!(root = %self.root.display(), "Watching");

        loop {
            match rx.recv_timeout(self.poll_interval) {
                Ok(Ok(event)) => {
                    for file_event in translate(&event) {
                        self.dispatcher.dispatch(&file_event);
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "Watch backend error"),
                Err(RecvTimeoutError::Timeout) => {
                    // Keep-alive tick; nothing pending.
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        Ok(())
    }
}

/// Maps one raw notify event onto dispatcher events. An event the session
/// has no use for (metadata touches, access notices, half of a rename pair)
/// translates to nothing.
pub fn translate(event: &notify::Event) -> Vec<FileEvent> {
    match event.kind {
        EventKind::Create(create_kind) => event
            .paths
            .iter()
            .map(|path| {
                let is_dir = create_kind == CreateKind::Folder || path.is_dir();
                FileEvent::created(path.clone(), is_dir)
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // The two-path form: old name first, new name second.
            if let [from, to] = event.paths.as_slice() {
                vec![FileEvent::moved(from.clone(), to.clone(), to.is_dir())]
            } else {
                trace!(?event, "Rename without a path pair");
                Vec::new()
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Half of a rename pair; the paired form arrives separately when
            // the backend can correlate it.
            Vec::new()
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|path| FileEvent::modified(path.clone(), path.is_dir()))
            .collect(),
        EventKind::Remove(remove_kind) => event
            .paths
            .iter()
            .map(|path| FileEvent::deleted(path.clone(), remove_kind == RemoveKind::Folder))
            .collect(),
        _ => Vec::new(),
    }
}
