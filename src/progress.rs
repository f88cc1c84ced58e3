//! Advisory notices about what a session is doing.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

/// How many unread notices are kept before new ones are dropped.
pub const PROGRESS_CAPACITY: usize = 256;

/// Informational event emitted alongside line batches.
///
/// These are not part of the line output: they are dropped when nobody is
/// listening, or when [`PROGRESS_CAPACITY`] notices are already waiting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Progress {
    /// A file started being watched.
    Discovered(PathBuf),
    /// A watched file disappeared and is no longer watched.
    Removed(PathBuf),
    /// New read state was stored for a file.
    Updated(PathBuf),
    /// A file shrank, so reading restarts from its beginning.
    Truncated(PathBuf),
    /// The registry no longer had an entry it was asked to change.
    RegistryMiss(PathBuf),
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Discovered(path) => write!(f, "added file {}", path.display()),
            Progress::Removed(path) => write!(f, "file {} was removed", path.display()),
            Progress::Updated(path) => write!(f, "file {} was updated", path.display()),
            Progress::Truncated(path) => write!(f, "file {} was truncated", path.display()),
            Progress::RegistryMiss(path) => {
                write!(f, "file {} is no longer being watched", path.display())
            }
        }
    }
}

/// Sending half of the progress channel, shared by both loops.
#[derive(Clone, Debug)]
pub(crate) struct Reporter {
    tx: mpsc::Sender<Progress>,
}

impl Reporter {
    pub(crate) fn new(tx: mpsc::Sender<Progress>) -> Self {
        Reporter { tx }
    }

    /// Never waits: a full or closed channel drops the notice.
    pub(crate) fn report(&self, progress: Progress) {
        if let Err(mpsc::error::TrySendError::Full(dropped)) = self.tx.try_send(progress) {
            tracing::trace!(progress = %dropped, "Progress channel full, dropping notice");
        }
    }
}
