//! The error type shared by every stage of a watch session.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Alias for results produced by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// No root paths were configured.
    #[error("No roots to start with")]
    NoRoots,
    /// A configured root does not exist when the session is created.
    #[error("Root {} does not exist: {source}", .root.display())]
    RootNotFound { root: PathBuf, source: io::Error },
    /// A configured root could not be turned into an absolute path.
    #[error("Could not get absolute path for {}: {source}", .path.display())]
    Absolutize { path: PathBuf, source: io::Error },
    /// A configured pattern failed to compile.
    #[error("Could not compile regular expression {pattern}: {source}")]
    Regex {
        pattern: String,
        source: regex::Error,
    },
    /// A root could no longer be stat'ed after the session started.
    #[error("Could not get stat for {}: {source}", .root.display())]
    Discovery { root: PathBuf, source: io::Error },
    /// Walking a directory root failed.
    #[error("Could not walk in {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
    /// Reading a watched file failed for a reason other than it being gone.
    #[error("Could not read lines in {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    /// The registry has no entry for the given path.
    #[error("{} is not being watched", .0.display())]
    NotFound(PathBuf),
    /// The consumer of line batches went away.
    #[error("Line batch receiver closed")]
    ChannelClosed,
    /// One of the session loops panicked.
    #[error("Session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Returns `true` for the errors a session recovers from on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
