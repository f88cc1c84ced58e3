//! Everything related to finding the files a session should watch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::config::RootSpec;
use crate::error::{Error, Result};
use crate::progress::{Progress, Reporter};
use crate::registry::Registry;

/// Registers every file currently matching `specs`, one root at a time.
///
/// Plain file roots are registered as-is; directory roots are walked and
/// their non-directory descendants registered when the root's pattern
/// allows it. Stops early without error once `cancel` fires.
pub(crate) fn scan(
    specs: &[RootSpec],
    registry: &Registry,
    reporter: &Reporter,
    cancel: &CancellationToken,
) -> Result<()> {
    for spec in specs {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let root = spec.root();
        let meta = root.metadata().map_err(|source| Error::Discovery {
            root: root.to_path_buf(),
            source,
        })?;

        if !meta.is_dir() {
            register(registry, reporter, root);
            continue;
        }

        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|source| Error::Walk {
                root: root.to_path_buf(),
                source,
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            if spec.matches(entry.path()) {
                register(registry, reporter, entry.path());
            }
        }
    }

    Ok(())
}

fn register(registry: &Registry, reporter: &Reporter, path: &Path) {
    if registry.add_if_absent(path) {
        tracing::info!(path = %path.display(), "Added file");
        reporter.report(Progress::Discovered(path.to_path_buf()));
    }
}

/// Keeps the registry populated until cancelled or a root goes bad.
pub(crate) async fn run(
    specs: Arc<[RootSpec]>,
    registry: Registry,
    reporter: Reporter,
    delay: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let (specs, registry, reporter, token) = (
            Arc::clone(&specs),
            registry.clone(),
            reporter.clone(),
            cancel.clone(),
        );
        tokio::task::spawn_blocking(move || scan(&specs, &registry, &reporter, &token)).await??;

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
