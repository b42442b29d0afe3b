//! Core library for the `ssm-harvest` configuration extractor.
//!
//! The crate discovers running Windows EC2 instances, checks that their SSM
//! agent is online, and pulls `appsettings.json` plus the host-specific
//! `appsettings.<hostname>.json` from each one by submitting PowerShell
//! commands and polling for their output. Retrieved files are written to a
//! timestamped local backup directory alongside a metadata record.
//!
//! The remote channel is abstracted behind [`CommandChannel`] and
//! [`TargetDiscovery`]; [`AwsCli`] implements both by driving the `aws`
//! executable through a [`CommandRunner`].

pub mod channel;
pub mod command;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod logging;
pub mod orchestrator;
pub mod persist;
pub mod readiness;
pub mod report;
pub mod runner;
pub mod ssm;
pub mod target;
pub mod test_support;

pub use channel::{CommandChannel, Invocation, InvocationStatus};
pub use command::{CommandClient, CommandResult, RemoteCommand};
pub use config::{ConfigError, HarvestConfig};
pub use context::RunContext;
pub use discovery::TargetDiscovery;
pub use error::{HarvestError, TargetFailure};
pub use extract::{ExtractedFile, ExtractionOutcome, ExtractionSettings, ExtractionStatus, Extractor};
pub use orchestrator::{HarvestOrchestrator, RunStatistics, TargetReport};
pub use persist::{BackupWriter, OutcomeSink, PersistReport};
pub use readiness::check_readiness;
pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner, RunnerError};
pub use ssm::{AwsCli, AwsCliSettings, AwsError, CallerIdentity};
pub use target::{CommandId, InstanceId, ReadinessStatus, Target};
