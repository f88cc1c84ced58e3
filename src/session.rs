//! Wiring of the discovery and reader loops into one watch session.

use std::pin::Pin;
use std::sync::Arc;
use std::task;
use std::time::Duration;

use futures_util::stream::Stream as FuturesStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RootSpec};
use crate::error::{Error, Result};
use crate::progress::{Progress, Reporter, PROGRESS_CAPACITY};
use crate::reader::LineBatch;
use crate::registry::Registry;
use crate::{discovery, reader};

/// A single watch session over a set of roots.
///
/// ## Backpressure
///
/// Batches are handed over one at a time: until the consumer takes a batch
/// from [`LineBatches`], the reader loop waits, and so does every other file.
/// Keep consuming, or drop the `LineBatches` to end the session.
///
/// [`LineBatches`]: struct.LineBatches.html
#[derive(Debug)]
pub struct Session {
    specs: Arc<[RootSpec]>,
    registry: Registry,
    delay: Duration,
    max_offset: u64,
    lines_tx: mpsc::Sender<LineBatch>,
    reporter: Reporter,
}

impl Session {
    /// Validates `config` and prepares a session.
    ///
    /// Returns the session along with the stream of line batches and the
    /// stream of progress notices; both end once [`Session::watch`] returns.
    pub fn new(config: Config) -> Result<(Self, LineBatches, Progresses)> {
        let specs = config.root_specs()?;
        for spec in &specs {
            tracing::info!(
                root = %spec.root().display(),
                pattern = spec.pattern().map(|p| p.as_str()),
                "Starting with root"
            );
        }

        let (lines_tx, lines_rx) = mpsc::channel(1);
        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CAPACITY);

        let session = Session {
            specs: specs.into(),
            registry: Registry::new(),
            delay: config.delay,
            max_offset: config.max_offset,
            lines_tx,
            reporter: Reporter::new(progress_tx),
        };

        Ok((
            session,
            LineBatches { rx: lines_rx },
            Progresses { rx: progress_rx },
        ))
    }

    /// Returns a handle to the registry of watched files.
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Runs both loops until `cancel` fires or either loop fails.
    ///
    /// Cancellation wins over a simultaneous failure and yields `Ok(())`.
    /// Either way both loops have stopped, and the output streams are
    /// closed, by the time this returns. A loop blocked handing over a batch
    /// only stops after the batch is taken or the `LineBatches` is dropped.
    pub async fn watch(self, cancel: CancellationToken) -> Result<()> {
        let Session {
            specs,
            registry,
            delay,
            max_offset,
            lines_tx,
            reporter,
        } = self;

        let stop = cancel.child_token();

        let mut discovery_task = tokio::spawn(discovery::run(
            specs,
            registry.clone(),
            reporter.clone(),
            delay,
            stop.clone(),
        ));
        let mut reader_task = tokio::spawn(reader::run(
            registry,
            reporter,
            lines_tx,
            delay,
            max_offset,
            stop.clone(),
        ));

        let (res, remaining) = tokio::select! {
            biased;
            _ = cancel.cancelled() => (Ok(()), vec![discovery_task, reader_task]),
            res = &mut discovery_task => (flatten(res), vec![reader_task]),
            res = &mut reader_task => (flatten(res), vec![discovery_task]),
        };

        stop.cancel();
        for handle in remaining {
            if let Err(e) = flatten(handle.await) {
                tracing::debug!(error = %e, "Loop failed while stopping");
            }
        }

        match &res {
            Ok(()) => tracing::info!("Stopped watching"),
            Err(e) => tracing::error!(error = %e, "Stopped watching"),
        }
        res
    }
}

fn flatten(res: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    res.map_err(Error::from).and_then(|res| res)
}

/// Stream of [`LineBatch`]es produced by a [`Session`].
#[derive(Debug)]
pub struct LineBatches {
    rx: mpsc::Receiver<LineBatch>,
}

impl LineBatches {
    /// Waits for the next batch, or `None` once the session has ended.
    pub async fn next_batch(&mut self) -> Option<LineBatch> {
        self.rx.recv().await
    }
}

impl FuturesStream for LineBatches {
    type Item = LineBatch;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Stream of [`Progress`] notices produced by a [`Session`].
///
/// Notices that find [`PROGRESS_CAPACITY`] others still unread are dropped,
/// so keeping this around without reading it costs bounded memory.
///
/// [`PROGRESS_CAPACITY`]: constant.PROGRESS_CAPACITY.html
#[derive(Debug)]
pub struct Progresses {
    rx: mpsc::Receiver<Progress>,
}

impl Progresses {
    /// Waits for the next notice, or `None` once the session has ended.
    pub async fn next_progress(&mut self) -> Option<Progress> {
        self.rx.recv().await
    }
}

impl FuturesStream for Progresses {
    type Item = Progress;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
