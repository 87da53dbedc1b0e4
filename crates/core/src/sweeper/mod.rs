//! Retention sweeper for the output directory.
//!
//! Artifacts are only kept for a fixed window. The sweeper compares each
//! file's modification time against that window and deletes what is older.
//! Working files of in-flight jobs stay young: configuration validation
//! requires the retention window to exceed twice the tool timeout.

mod config;
mod runner;

pub use config::SweeperConfig;
pub use runner::{RetentionSweeper, SweepReport};
