//! Periodic eviction of downloaded bundles.
//!
//! Every cycle empties the storage root except for bundles that currently
//! hold a [`BundleLease`](super::BundleLease). The lease check and the
//! rename that takes a bundle out of service happen under the lease lock,
//! so a session either gets its lease first or finds the bundle already
//! gone; it never reads from a directory mid-delete.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::leases::BundleLeases;

const REAPING_PREFIX: &str = ".reaping-";

/// Outcome of one reaper cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Entries deleted
    pub removed: usize,
    /// Bundles left alone because a session holds them
    pub skipped_active: usize,
    /// Entries that could not be renamed or deleted
    pub failed: usize,
}

/// Periodically empties the storage root.
#[derive(Debug, Clone)]
pub struct StorageReaper {
    root: PathBuf,
    interval: Duration,
    leases: BundleLeases,
}

impl StorageReaper {
    /// Creates a reaper for `root` that respects `leases`.
    pub fn new(root: impl Into<PathBuf>, interval: Duration, leases: BundleLeases) -> Self {
        Self {
            root: root.into(),
            interval,
            leases,
        }
    }

    /// Directory being reaped.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs a single cycle.
    ///
    /// Never fails: a missing root is an empty cycle and per-entry failures
    /// are logged and counted in the report.
    pub async fn reap_once(&self) -> ReapReport {
        let mut report = ReapReport::default();

        let entries = match list_entries(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Storage root {} does not exist yet", self.root.display());
                return report;
            }
            Err(e) => {
                error!("Failed to list storage root {}: {}", self.root.display(), e);
                report.failed += 1;
                return report;
            }
        };

        let retire = {
            let root = self.root.clone();
            let leases = self.leases.clone();
            tokio::task::spawn_blocking(move || retire_idle(&root, &leases, entries))
        };
        let doomed = match retire.await {
            Ok(retired) => {
                report.skipped_active += retired.skipped_active;
                report.failed += retired.failed;
                retired.doomed
            }
            Err(e) => {
                error!("Retire step for {} panicked: {}", self.root.display(), e);
                report.failed += 1;
                return report;
            }
        };

        for path in doomed {
            let target = path.clone();
            let outcome = tokio::task::spawn_blocking(move || remove_path(&target))
                .await
                .unwrap_or_else(|join| Err(io::Error::other(join)));

            match outcome {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    error!("Failed to remove {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Starts reaping every `interval`, first run one interval from now.
    pub fn spawn(self) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let period = self.interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            info!(
                "Storage reaper watching {} every {:?}",
                self.root.display(),
                period
            );
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.reap_once().await;
                        info!(
                            "Reaper cycle on {}: removed {}, skipped {} active, {} failed",
                            self.root.display(),
                            report.removed,
                            report.skipped_active,
                            report.failed
                        );
                    }
                    _ = &mut shutdown_rx => {
                        debug!("Storage reaper stopping");
                        break;
                    }
                }
            }
        });

        ReaperHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a running reaper task.
pub struct ReaperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stops the reaper and waits for any in-flight cycle to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!("Storage reaper task ended abnormally: {}", e);
        }
    }
}

#[derive(Default)]
struct Retired {
    doomed: Vec<PathBuf>,
    skipped_active: usize,
    failed: usize,
}

/// Renames every idle entry out of the way while holding the lease lock.
///
/// Blocking; runs on the blocking pool.
fn retire_idle(root: &Path, leases: &BundleLeases, entries: Vec<(String, PathBuf)>) -> Retired {
    let table = leases.lock();
    let mut retired = Retired::default();

    for (name, path) in entries {
        if name.starts_with(REAPING_PREFIX) {
            // Left over from a cycle whose delete failed.
            retired.doomed.push(path);
            continue;
        }
        if table.is_leased(&name) {
            debug!("Skipping {}: bundle is being streamed", name);
            retired.skipped_active += 1;
            continue;
        }

        let target = root.join(format!("{REAPING_PREFIX}{}", Uuid::new_v4()));
        match std::fs::rename(&path, &target) {
            Ok(()) => retired.doomed.push(target),
            Err(e) => {
                warn!("Failed to retire {}: {}", path.display(), e);
                retired.failed += 1;
            }
        }
    }

    retired
}

async fn list_entries(root: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(root).await?;
    while let Some(entry) = dir.next_entry().await? {
        entries.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }
    Ok(entries)
}

fn remove_path(path: &Path) -> io::Result<()> {
    if std::fs::symlink_metadata(path)?.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}
