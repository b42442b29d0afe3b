//! Error taxonomy shared by the extraction pipeline and the orchestrator.
//!
//! [`HarvestError`] is fatal and ends the run. [`TargetFailure`] is scoped to
//! one target: it is logged, folded into the run statistics, and never stops
//! other targets from being processed.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::ssm::AwsError;
use crate::target::ReadinessStatus;

/// Per-target failures collected into the final report.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TargetFailure {
    /// The target's agent is not reachable; nothing was submitted.
    #[error("{target}: SSM agent not ready (status {status})")]
    Unready {
        /// Target display name.
        target: String,
        /// Observed readiness.
        status: ReadinessStatus,
    },
    /// A single remote command did not succeed.
    #[error("{target}: {step} failed: {diagnostic}")]
    RemoteCommand {
        /// Target display name.
        target: String,
        /// Pipeline step, for example `hostname` or a file name.
        step: String,
        /// Diagnostic from the command channel client.
        diagnostic: String,
    },
    /// The configured directory does not exist on the target.
    #[error("{target}: directory {path} not found")]
    DirectoryMissing {
        /// Target display name.
        target: String,
        /// Remote directory that was checked.
        path: String,
    },
    /// A retrieved file or the metadata record could not be written.
    #[error("{target}: failed to save {path}: {message}")]
    Persistence {
        /// Target display name.
        target: String,
        /// Local path relative to the backup root.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        message: String,
    },
}

/// Fatal errors that abort a run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The channel or credentials are unusable.
    #[error("AWS transport unavailable: {0}")]
    Transport(#[source] AwsError),
    /// Target discovery failed.
    #[error("instance discovery failed: {0}")]
    Discovery(#[source] AwsError),
    /// Discovery returned nothing to process.
    #[error("no Windows instances matched the filter")]
    NoTargets,
    /// The local backup root could not be prepared.
    #[error("cannot prepare backup directory {path}: {message}")]
    Backup {
        /// Directory that could not be created or opened.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        message: String,
    },
    /// The log file or subscriber could not be set up.
    #[error("cannot initialise logging: {0}")]
    Logging(String),
}
