//! Pipeline module: the job lifecycle.
//!
//! The [`PipelineCoordinator`] validates a source URL, asks the admission gate
//! for a slot, then either converts the source into a served file (buffered
//! mode) or hands back a live [`DeliveryStream`] (streamed mode). Every exit
//! path releases the slot and, for buffered jobs, settles the workspace.
//!
//! # Example
//!
//! ```ignore
//! use audiograb_core::pipeline::{PipelineCoordinator, PipelineConfig, SubmitRequest};
//!
//! let coordinator = PipelineCoordinator::with_tools(PipelineConfig::default(), &tools)?;
//!
//! match coordinator.submit(SubmitRequest::buffered(url, identity)).await? {
//!     JobOutcome::Completed(result) => println!("{}", result.artifact.public_url),
//!     JobOutcome::Streaming(stream) => forward(stream).await,
//! }
//! ```

mod config;
mod coordinator;
mod delivery;
mod error;
mod registry;
mod types;
mod validator;

pub use config::{PipelineConfig, DEFAULT_SOURCE_PATTERN};
pub use coordinator::{JobOutcome, PipelineCoordinator};
pub use delivery::DeliveryStream;
pub use error::{ErrorClass, PipelineError};
pub use types::{
    display_file_name, Artifact, DeliveryMode, InvalidTransition, Job, JobResult, JobSnapshot,
    JobState, PipelineStatus, PipelineTotals, SubmitRequest,
};
pub use validator::SourceValidator;
