//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Pipeline jobs (submissions, outcomes, durations, admission rejections)
//! - External tools (invocations by result)
//! - Retention sweeps

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Jobs submitted by delivery mode.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("audiograb_jobs_submitted_total", "Total jobs submitted"),
        &["mode"], // "buffered", "streamed"
    )
    .unwrap()
});

/// Jobs finished by delivery mode and result.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("audiograb_jobs_finished_total", "Total jobs finished"),
        &["mode", "result"], // "completed", "stream_ended", "failed", "aborted", "rejected"
    )
    .unwrap()
});

/// Wall-clock duration of admitted jobs.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("audiograb_job_duration_seconds", "Duration of admitted jobs")
            .buckets(vec![1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["mode", "result"],
    )
    .unwrap()
});

/// Submissions refused because every admission slot was taken.
pub static ADMISSION_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "audiograb_admission_rejections_total",
        "Jobs rejected because the pipeline was at capacity",
    )
    .unwrap()
});

/// Bytes delivered to streaming clients.
pub static STREAMED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "audiograb_streamed_bytes_total",
        "Total bytes delivered in streamed mode",
    )
    .unwrap()
});

// =============================================================================
// External Tool Metrics
// =============================================================================

/// External tool invocations by tool and result.
pub static TOOL_INVOCATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "audiograb_tool_invocations_total",
            "Total external tool invocations",
        ),
        &["tool", "result"], // "success", "failed", "timeout", "terminated"
    )
    .unwrap()
});

// =============================================================================
// Sweeper Metrics
// =============================================================================

pub static SWEEP_RUNS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("audiograb_sweep_runs_total", "Total retention sweeps").unwrap()
});

pub static SWEEP_FILES_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "audiograb_sweep_files_deleted_total",
        "Files deleted by the retention sweeper",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(ADMISSION_REJECTIONS.clone()),
        Box::new(STREAMED_BYTES.clone()),
        // External tools
        Box::new(TOOL_INVOCATIONS.clone()),
        // Sweeper
        Box::new(SWEEP_RUNS.clone()),
        Box::new(SWEEP_FILES_DELETED.clone()),
    ]
}
