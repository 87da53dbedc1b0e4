pub mod admission;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod process;
pub mod resolver;
pub mod sweeper;
pub mod testing;
pub mod transcode;
pub mod workspace;

pub use admission::{AdmissionGate, AdmissionToken, GateStatus};
pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, ApiKeyEntry, AuthConfig, AuthMethod,
    Config, ConfigError, SanitizedConfig, ServerConfig,
};
pub use pipeline::{
    Artifact, DeliveryMode, DeliveryStream, ErrorClass, JobOutcome, JobResult, JobSnapshot,
    JobState, PipelineConfig, PipelineCoordinator, PipelineError, PipelineStatus, PipelineTotals,
    SubmitRequest,
};
pub use process::{ProcessError, ProcessRunner, ToolsConfig};
pub use resolver::{Metadata, MetadataResolver, ResolveError, SizeEstimate, YtDlpResolver};
pub use sweeper::{RetentionSweeper, SweepReport, SweeperConfig};
pub use transcode::{AudioFormat, TagSet, TranscodeError, Transcoder, YtDlpTranscoder};
pub use workspace::{WorkspaceError, WorkspaceHandle, WorkspaceManager};
