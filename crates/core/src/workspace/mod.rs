//! Workspace module for per-job output files.
//!
//! Each buffered job gets a working path (`{job_id}.partial.{ext}`) that the
//! external tools write into, and a final path (`{job_id}.{ext}`) that only
//! ever appears through an atomic rename. Handles are settled by exactly one
//! of `promote` or `discard`; a handle dropped on an early return cleans up
//! after itself.

mod error;
mod manager;

pub use error::WorkspaceError;
pub use manager::{WorkspaceHandle, WorkspaceManager};
