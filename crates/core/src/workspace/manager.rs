//! Workspace allocation, promotion and cleanup.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::WorkspaceError;

/// Marker between the job id and the extension of a working file.
const WORKING_MARKER: &str = "partial";

/// Hands out per-job file pairs inside one output directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    output_dir: PathBuf,
}

/// Working and final path of one buffered job.
///
/// Settled by exactly one of [`WorkspaceManager::promote`] or
/// [`WorkspaceManager::discard`]. Dropping an unsettled handle removes its
/// files synchronously.
#[derive(Debug)]
pub struct WorkspaceHandle {
    job_id: Uuid,
    dir: PathBuf,
    working_path: PathBuf,
    final_path: PathBuf,
    settled: bool,
}

impl WorkspaceManager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reserves `{job_id}.partial.{ext}` and `{job_id}.{ext}` for a job,
    /// creating the output directory when needed.
    pub async fn allocate(
        &self,
        job_id: Uuid,
        extension: &str,
    ) -> Result<WorkspaceHandle, WorkspaceError> {
        fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            WorkspaceError::DirectoryCreationFailed {
                path: self.output_dir.clone(),
                source: e,
            }
        })?;

        let handle = WorkspaceHandle {
            job_id,
            dir: self.output_dir.clone(),
            working_path: self
                .output_dir
                .join(format!("{}.{}.{}", job_id, WORKING_MARKER, extension)),
            final_path: self.output_dir.join(format!("{}.{}", job_id, extension)),
            settled: false,
        };

        debug!(job_id = %job_id, path = %handle.working_path.display(), "Allocated workspace");
        Ok(handle)
    }

    /// Renames the working file to the final path.
    ///
    /// A missing working file discards the handle and returns
    /// [`WorkspaceError::NotFound`].
    pub async fn promote(&self, mut handle: WorkspaceHandle) -> Result<PathBuf, WorkspaceError> {
        match fs::rename(&handle.working_path, &handle.final_path).await {
            Ok(()) => {
                handle.settled = true;
                debug!(job_id = %handle.job_id, path = %handle.final_path.display(), "Promoted workspace");
                Ok(handle.final_path.clone())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let path = handle.working_path.clone();
                self.discard(handle).await?;
                Err(WorkspaceError::NotFound { path })
            }
            Err(e) => Err(WorkspaceError::promote_failed(
                handle.working_path.clone(),
                handle.final_path.clone(),
                e,
            )),
        }
    }

    /// Removes the working file, the final file and any tool intermediates.
    /// Files that do not exist are ignored.
    pub async fn discard(&self, mut handle: WorkspaceHandle) -> Result<(), WorkspaceError> {
        handle.settled = true;

        let mut removed = 0usize;
        for path in [&handle.working_path, &handle.final_path] {
            if remove_if_exists(path).await? {
                removed += 1;
            }
        }
        for path in intermediates(&handle.dir, &handle.job_id).await {
            if remove_if_exists(&path).await? {
                removed += 1;
            }
        }

        debug!(job_id = %handle.job_id, removed, "Discarded workspace");
        Ok(())
    }
}

impl WorkspaceHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Where the tools write.
    pub fn working_path(&self) -> &Path {
        &self.working_path
    }

    /// Where the artifact appears after promotion.
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Prefix shared by every intermediate a tool may leave next to the working file.
    pub fn working_prefix(&self) -> String {
        working_prefix(&self.job_id)
    }
}

impl Drop for WorkspaceHandle {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(job_id = %self.job_id, "Workspace dropped without promote or discard, cleaning up");

        let mut paths = vec![self.working_path.clone(), self.final_path.clone()];
        let prefix = working_prefix(&self.job_id);
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            paths.extend(
                entries
                    .flatten()
                    .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
                    .map(|entry| entry.path()),
            );
        }
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove workspace file"),
            }
        }
    }
}

fn working_prefix(job_id: &Uuid) -> String {
    format!("{}.{}.", job_id, WORKING_MARKER)
}

async fn intermediates(dir: &Path, job_id: &Uuid) -> Vec<PathBuf> {
    let prefix = working_prefix(job_id);
    let mut found = Vec::new();
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return found;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            found.push(entry.path());
        }
    }
    found
}

async fn remove_if_exists(path: &Path) -> Result<bool, WorkspaceError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(WorkspaceError::DiscardFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
