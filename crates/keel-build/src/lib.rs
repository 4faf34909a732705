//! Keel reactor build orchestration
//!
//! Runs planned goals across a multi-project reactor:
//! - Task segments split at aggregating goals
//! - Sequential or worker-pool execution in dependency order
//! - Fail-fast, fail-at-end and fail-never failure handling
//! - Resumption data for restarting failed builds
//! - Per-project build summary

pub mod builder;
pub mod error;
pub mod executor;
pub mod resume;
pub mod segment;
pub mod session;
pub mod status;
pub mod summary;

// Re-export main types
pub use builder::ReactorBuilder;
pub use error::{BuildError, BuildResult};
pub use executor::{LoggingExecutor, MojoExecutor, MojoFailure};
pub use resume::ResumptionData;
pub use segment::{calculate_task_segments, project_segments, ProjectSegment, TaskSegment};
pub use session::ReactorSession;
pub use status::ReactorBuildStatus;
pub use summary::{BuildSummary, ProjectOutcome, ProjectStatus};
