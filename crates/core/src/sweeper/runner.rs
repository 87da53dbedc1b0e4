//! Retention sweeper implementation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::config::SweeperConfig;
use crate::metrics::{SWEEP_FILES_DELETED, SWEEP_RUNS};

/// Outcome of one pass over the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Regular files inspected.
    pub scanned: usize,
    /// Files removed for being past retention.
    pub deleted: usize,
    /// Files that could not be inspected or removed.
    pub errors: usize,
}

/// Periodically deletes expired files from the output directory.
pub struct RetentionSweeper {
    config: SweeperConfig,
    output_dir: PathBuf,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RetentionSweeper {
    pub fn new(config: SweeperConfig, output_dir: impl Into<PathBuf>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            output_dir: output_dir.into(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.config.retention_secs)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Deletes every regular file whose mtime is more than the retention
    /// window before `now`. A missing directory is an empty sweep.
    pub async fn sweep_once(&self, now: SystemTime) -> SweepReport {
        sweep_dir(&self.output_dir, self.retention(), now).await
    }

    /// Start the background loop.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Retention sweeper already running");
            return;
        }

        let running = Arc::clone(&self.running);
        let output_dir = self.output_dir.clone();
        let retention = self.retention();
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!(
            dir = %output_dir.display(),
            interval_secs = interval.as_secs(),
            retention_secs = retention.as_secs(),
            "Retention sweeper started"
        );

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Retention sweeper received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        sweep_dir(&output_dir, retention, SystemTime::now()).await;
                    }
                }
            }
            info!("Retention sweeper stopped");
        });
    }

    /// Stop the background loop.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Retention sweeper not running");
            return;
        }
        let _ = self.shutdown_tx.send(());
    }
}

async fn sweep_dir(dir: &Path, retention: Duration, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();
    SWEEP_RUNS.inc();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Output directory does not exist yet");
            return report;
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to read output directory");
            report.errors += 1;
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read directory entry");
                report.errors += 1;
                break;
            }
        };
        let path = entry.path();

        let modified = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta.modified(),
            Ok(_) => continue,
            Err(e) => Err(e),
        };
        report.scanned += 1;

        let modified = match modified {
            Ok(time) => time,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read modification time");
                report.errors += 1;
                continue;
            }
        };

        // Files from the future have age zero.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= retention {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), age_secs = age.as_secs(), "Deleted expired file");
                report.deleted += 1;
            }
            // Removed concurrently, e.g. by a job discarding its workspace.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete expired file");
                report.errors += 1;
            }
        }
    }

    SWEEP_FILES_DELETED.inc_by(report.deleted as u64);
    if report.deleted > 0 || report.errors > 0 {
        info!(
            scanned = report.scanned,
            deleted = report.deleted,
            errors = report.errors,
            "Retention sweep finished"
        );
    }
    report
}
