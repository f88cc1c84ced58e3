//! A library providing polling, multiplexed tailing for (namely log) files
//! discovered under one or more root paths.
//!
//! Roots are walked periodically, and every file found (optionally filtered by
//! a regular expression paired with its root) is read for newly appended,
//! complete lines.
//!
//! ## Example
//!
//! ```no_run
//! use pollmux::{CancellationToken, Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pollmux::Error> {
//!     // Watch `.log` files under /var/log/app, and everything under ./logs.
//!     let config = Config::new(["/var/log/app", "./logs"]).with_patterns([r"\.log$"]);
//!     let (session, mut batches, _progress) = Session::new(config)?;
//!
//!     let cancel = CancellationToken::new();
//!     let watch = tokio::spawn(session.watch(cancel.clone()));
//!
//!     // Wait for `LineBatch`es, each holding the new lines of one file.
//!     while let Some(batch) = batches.next_batch().await {
//!         for line in batch.iter() {
//!             println!("({}) {}", batch.source().display(), line);
//!         }
//!     }
//!
//!     watch.await.expect("session panicked")
//! }
//! ```
//!
//! ## Caveats
//!
//! Reading is purely polling based and each file is read independently, so
//! lines of different files are not ordered relative to each other. A file
//! seen for the first time is only read from at most `max_offset` bytes before
//! its end, and the first (likely partial) line of such a read is skipped.

mod config;
mod discovery;
mod error;
mod progress;
mod reader;
mod registry;
mod session;

pub use config::{Config, RootSpec, DEFAULT_DELAY, DEFAULT_MAX_OFFSET};
pub use error::{Error, Result};
pub use progress::{Progress, PROGRESS_CAPACITY};
pub use reader::LineBatch;
pub use registry::{Registry, WatchedFile};
pub use session::{LineBatches, Progresses, Session};
pub use tokio_util::sync::CancellationToken;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
