//! Tracking state for every file under observation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Read progress of a single watched file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WatchedFile {
    /// Absolute path, unique within a [`Registry`].
    pub path: PathBuf,
    /// Byte offset up to which lines have been consumed.
    pub cursor: u64,
    /// File size as of the previous read.
    pub last_observed_size: u64,
    /// Whether the file has been read at least once.
    pub ever_read: bool,
}

impl WatchedFile {
    /// A never read entry for `path`, with a zero cursor and size.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WatchedFile {
            path: path.into(),
            cursor: 0,
            last_observed_size: 0,
            ever_read: false,
        }
    }
}

/// Shared, insertion-ordered store of [`WatchedFile`]s keyed by path.
///
/// Cloning a `Registry` yields another handle to the same store. Every
/// operation takes the one lock for its own duration only, so no lock is
/// ever held across I/O.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    files: Arc<Mutex<IndexMap<PathBuf, WatchedFile>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Starts watching `path` from scratch unless it is already watched.
    ///
    /// Returns `true` if the path was newly added.
    pub fn add_if_absent(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut files = self.files.lock();
        if files.contains_key(path) {
            return false;
        }
        files.insert(path.to_path_buf(), WatchedFile::new(path));
        true
    }

    /// Returns a copy of every entry, in the order they were added.
    pub fn snapshot(&self) -> Vec<WatchedFile> {
        self.files.lock().values().cloned().collect()
    }

    /// Replaces the entry with the same path as `entry`.
    pub fn update(&self, entry: WatchedFile) -> Result<()> {
        let mut files = self.files.lock();
        match files.get_mut(&entry.path) {
            Some(slot) => {
                *slot = entry;
                Ok(())
            }
            None => Err(Error::NotFound(entry.path)),
        }
    }

    /// Stops watching `path`, returning its last known state.
    pub fn remove(&self, path: impl AsRef<Path>) -> Result<WatchedFile> {
        let path = path.as_ref();
        self.files
            .lock()
            .shift_remove(path)
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))
    }

    /// Returns a copy of the entry for `path`, if it is watched.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<WatchedFile> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    /// Number of watched files.
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    /// Whether no file is watched.
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}
