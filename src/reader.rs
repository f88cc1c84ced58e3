//! Everything related to reading newly appended lines from watched files.

use std::io;
use std::path::{Path, PathBuf};
use std::slice::Iter;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::progress::{Progress, Reporter};
use crate::registry::{Registry, WatchedFile};

/// Batch of complete lines read from a single file in a single cycle.
///
/// A batch is never empty, and lines of the same file arrive in file order
/// across consecutive batches.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LineBatch {
    /// The path from where the lines were read.
    source: PathBuf,
    /// Short name of the file for display.
    name: String,
    /// The batched list of lines.
    lines: Vec<String>,
}

impl LineBatch {
    pub(crate) fn new(source: PathBuf, lines: Vec<String>) -> Self {
        let name = source
            .file_name()
            .unwrap_or(source.as_os_str())
            .to_string_lossy()
            .into_owned();

        LineBatch {
            source,
            name,
            lines,
        }
    }

    /// Returns a reference to the file from where the lines were read.
    pub fn source(&self) -> &Path {
        self.source.as_path()
    }

    /// Returns the file name of the source, for display.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a slice to the vec of lines.
    pub fn lines(&self) -> &[String] {
        self.lines.as_slice()
    }

    /// Returns an iterator over the slice of lines.
    pub fn iter(&self) -> Iter<String> {
        self.lines().iter()
    }

    /// Returns the number of lines in the batch.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if the number of lines in the batch is zero.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the internal components that make up a `LineBatch`. Hidden as
    /// the return signature may change.
    #[doc(hidden)]
    pub fn into_inner(self) -> (PathBuf, Vec<String>) {
        let LineBatch { source, lines, .. } = self;

        (source, lines)
    }
}

impl IntoIterator for LineBatch {
    type Item = String;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

/// What a single read of a watched file found.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum ReadOutcome {
    /// The file no longer exists.
    Missing,
    /// The size did not change since the previous read.
    Unchanged,
    /// The file was read; `entry` is the state to store.
    Read {
        entry: WatchedFile,
        lines: Vec<String>,
        truncated: bool,
    },
}

/// Reads the complete lines appended to `entry.path` since the last read.
///
/// A file read for the first time starts at most `max_offset` bytes from its
/// end. Any read that does not start at byte 0 drops the first line it scans,
/// since that line was already there (possibly half written) last time. After
/// consuming lines the cursor rests on the newline ending the last one, so
/// the dropped line of the next read is the empty remainder.
pub(crate) async fn read_file(entry: &WatchedFile, max_offset: u64) -> io::Result<ReadOutcome> {
    let mut file = match File::open(&entry.path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
        Err(e) => return Err(e),
    };

    let size = file.metadata().await?.len();

    let mut cursor = entry.cursor;
    let mut truncated = false;
    if !entry.ever_read {
        if size > max_offset {
            cursor = size - max_offset;
        }
    } else if size < entry.last_observed_size || size < cursor {
        cursor = 0;
        truncated = true;
    }

    if size == entry.last_observed_size {
        return Ok(ReadOutcome::Unchanged);
    }

    file.seek(io::SeekFrom::Start(cursor)).await?;
    // Bytes written after the stat are left for the next cycle.
    let mut reader = BufReader::new(file.take(size.saturating_sub(cursor)));

    let mut lines = Vec::new();
    let mut buf = Vec::new();
    let mut pos = cursor;
    let mut next_cursor = cursor;
    let mut first = true;

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 || buf.last() != Some(&b'\n') {
            // Unterminated lines are picked up once complete.
            break;
        }
        pos += n as u64;
        next_cursor = pos - 1;

        if std::mem::replace(&mut first, false) && skips_first_line(entry, cursor, truncated, &buf)
        {
            continue;
        }
        lines.push(decode_line(&buf));
    }

    Ok(ReadOutcome::Read {
        entry: WatchedFile {
            path: entry.path.clone(),
            cursor: next_cursor,
            last_observed_size: size,
            ever_read: true,
        },
        lines,
        truncated,
    })
}

/// Whether `line`, the first one scanned from `cursor`, was already consumed.
///
/// A cursor of 0 on a file read before is ambiguous: either no line has
/// been complete yet, or the first line was empty and the cursor rests on
/// its newline at byte 0. Only the latter scans a bare `\n` first, since the
/// former saw a non-newline byte there last time.
fn skips_first_line(entry: &WatchedFile, cursor: u64, truncated: bool, line: &[u8]) -> bool {
    if cursor != 0 {
        return true;
    }
    entry.ever_read && !truncated && line == b"\n"
}

fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Reads every watched file once per `delay` until cancelled or a read fails.
pub(crate) async fn run(
    registry: Registry,
    reporter: Reporter,
    lines_tx: mpsc::Sender<LineBatch>,
    delay: Duration,
    max_offset: u64,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        for entry in registry.snapshot() {
            if cancel.is_cancelled() {
                return Ok(());
            }
            poll_file(&entry, &registry, &reporter, &lines_tx, max_offset).await?;
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn poll_file(
    entry: &WatchedFile,
    registry: &Registry,
    reporter: &Reporter,
    lines_tx: &mpsc::Sender<LineBatch>,
    max_offset: u64,
) -> Result<()> {
    let outcome = read_file(entry, max_offset)
        .await
        .map_err(|source| Error::Read {
            path: entry.path.clone(),
            source,
        })?;

    match outcome {
        ReadOutcome::Unchanged => {}
        ReadOutcome::Missing => match registry.remove(&entry.path) {
            Ok(_) => {
                tracing::info!(path = %entry.path.display(), "File was removed");
                reporter.report(Progress::Removed(entry.path.clone()));
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "Could not stop watching removed file");
                reporter.report(Progress::RegistryMiss(entry.path.clone()));
            }
            Err(e) => return Err(e),
        },
        ReadOutcome::Read {
            entry: next,
            lines,
            truncated,
        } => {
            if truncated {
                tracing::warn!(
                    path = %next.path.display(),
                    old_size = entry.last_observed_size,
                    new_size = next.last_observed_size,
                    "File shrank, reading from the start"
                );
                reporter.report(Progress::Truncated(next.path.clone()));
            }

            if !lines.is_empty() {
                lines_tx
                    .send(LineBatch::new(next.path.clone(), lines))
                    .await
                    .map_err(|_| Error::ChannelClosed)?;
            }

            let path = next.path.clone();
            let cursor = next.cursor;
            match registry.update(next) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), cursor, "File was updated");
                    reporter.report(Progress::Updated(path));
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "Could not update information about file");
                    reporter.report(Progress::RegistryMiss(path));
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}
