//! Per-target extraction pipeline.
//!
//! The pipeline runs strictly in order and short-circuits on the two fatal
//! steps:
//!
//! 1. readiness check (abort when the agent is not online);
//! 2. hostname lookup (non-fatal, falls back to `unknown`);
//! 3. directory check (abort when the base path is absent);
//! 4. one fetch per candidate file, each independent of the others.

use std::time::Duration;

use crate::channel::CommandChannel;
use crate::command::{CommandClient, CommandResult, RemoteCommand};
use crate::error::TargetFailure;
use crate::readiness::check_readiness;
use crate::target::{ReadinessStatus, Target};

/// Output that marks a candidate file as absent on the remote host.
pub const FILE_NOT_FOUND_MARKER: &str = "FILE_NOT_FOUND";
/// Hostname recorded when the host cannot report its own.
pub const UNKNOWN_HOSTNAME: &str = "unknown";
/// Base name of the configuration file being collected.
pub const BASE_FILE_NAME: &str = "appsettings.json";

const HOSTNAME_SCRIPT: &str = "$env:COMPUTERNAME";
const DIRECTORY_PRESENT: &str = "True";

/// Knobs for one extraction run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtractionSettings {
    /// Remote directory holding the configuration files.
    pub target_path: String,
    /// Wait budget for the hostname and directory checks.
    pub command_timeout: Duration,
    /// Wait budget for each file fetch.
    pub file_timeout: Duration,
}

/// One retrieved file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtractedFile {
    /// File name relative to the target path.
    pub name: String,
    /// Content exactly as returned by the host.
    pub content: String,
}

/// How far the pipeline got for a target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExtractionStatus {
    /// Aborted at the readiness check.
    Unready(ReadinessStatus),
    /// Aborted because the target directory is missing.
    DirectoryMissing,
    /// Every candidate was attempted.
    Completed,
}

/// Files retrieved from one target, in candidate order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtractionOutcome {
    /// Retrieved files; a candidate absent here was not found or unreadable.
    pub files: Vec<ExtractedFile>,
    /// Pipeline status.
    pub status: ExtractionStatus,
    /// Failures encountered along the way.
    pub failures: Vec<TargetFailure>,
}

impl ExtractionOutcome {
    const fn aborted(status: ExtractionStatus, failures: Vec<TargetFailure>) -> Self {
        Self {
            files: Vec::new(),
            status,
            failures,
        }
    }

    /// Number of retrieved files.
    #[must_use]
    pub const fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` when no file was retrieved.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Candidate file names for a host, generic file first.
#[must_use]
pub fn candidate_files(hostname: &str) -> [String; 2] {
    [
        String::from(BASE_FILE_NAME),
        format!("appsettings.{hostname}.json"),
    ]
}

/// Joins a Windows base path and a file name with `\`.
#[must_use]
pub fn remote_path(base: &str, file_name: &str) -> String {
    let trimmed = base.trim_end_matches(['\\', '/']);
    format!("{trimmed}\\{file_name}")
}

/// Quotes `value` as a PowerShell single-quoted literal.
#[must_use]
pub fn powershell_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn fetch_script(path: &str) -> String {
    let quoted = powershell_literal(path);
    format!(
        "if (Test-Path {quoted}) {{ Get-Content {quoted} -Raw }} else {{ {} }}",
        powershell_literal(FILE_NOT_FOUND_MARKER)
    )
}

/// Runs the extraction pipeline against targets over a command channel.
#[derive(Clone, Debug)]
pub struct Extractor<C> {
    client: CommandClient<C>,
    settings: ExtractionSettings,
}

impl<C: CommandChannel> Extractor<C> {
    /// Creates an extractor.
    #[must_use]
    pub const fn new(client: CommandClient<C>, settings: ExtractionSettings) -> Self {
        Self { client, settings }
    }

    /// Returns the extraction settings.
    #[must_use]
    pub const fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Extracts the candidate files from `target`, recording its readiness
    /// status and hostname on the way.
    pub async fn extract(&self, target: &mut Target) -> ExtractionOutcome {
        tracing::info!(host = %target.name, "extracting files");
        let mut failures = Vec::new();

        let (ready, status) = check_readiness(self.client.channel(), target).await;
        if !ready {
            failures.push(TargetFailure::Unready {
                target: target.name.clone(),
                status,
            });
            return ExtractionOutcome::aborted(ExtractionStatus::Unready(status), failures);
        }

        let hostname = self.resolve_hostname(target, &mut failures).await;

        if !self.directory_exists(target, &mut failures).await {
            return ExtractionOutcome::aborted(ExtractionStatus::DirectoryMissing, failures);
        }

        let mut files = Vec::new();
        for name in candidate_files(&hostname) {
            if let Some(content) = self.fetch_file(target, &name, &mut failures).await {
                files.push(ExtractedFile { name, content });
            }
        }

        ExtractionOutcome {
            files,
            status: ExtractionStatus::Completed,
            failures,
        }
    }

    async fn resolve_hostname(&self, target: &mut Target, failures: &mut Vec<TargetFailure>) -> String {
        let command = RemoteCommand::new(HOSTNAME_SCRIPT, self.settings.command_timeout);
        let result = self.client.execute(&target.instance_id, &command).await;
        let reported = result.output().map(str::trim).filter(|name| !name.is_empty());

        let Some(name) = reported else {
            tracing::warn!(host = %target.name, "could not resolve hostname");
            if !matches!(result, CommandResult::Success(_)) {
                failures.push(TargetFailure::RemoteCommand {
                    target: target.name.clone(),
                    step: String::from("hostname"),
                    diagnostic: result.diagnostic(),
                });
            }
            target.hostname = Some(String::from(UNKNOWN_HOSTNAME));
            return String::from(UNKNOWN_HOSTNAME);
        };

        tracing::debug!(host = %target.name, hostname = name, "resolved hostname");
        target.hostname = Some(name.to_owned());
        name.to_owned()
    }

    async fn directory_exists(&self, target: &Target, failures: &mut Vec<TargetFailure>) -> bool {
        let path = &self.settings.target_path;
        tracing::debug!(host = %target.name, path = %path, "checking directory");
        let script = format!("Test-Path {}", powershell_literal(path));
        let command = RemoteCommand::new(script, self.settings.command_timeout);
        let result = self.client.execute(&target.instance_id, &command).await;

        match result.output().map(str::trim) {
            Some(DIRECTORY_PRESENT) => true,
            Some(_) => {
                tracing::warn!(host = %target.name, path = %path, "directory not found");
                failures.push(TargetFailure::DirectoryMissing {
                    target: target.name.clone(),
                    path: path.clone(),
                });
                false
            }
            None => {
                tracing::warn!(host = %target.name, path = %path, "directory check failed");
                failures.push(TargetFailure::RemoteCommand {
                    target: target.name.clone(),
                    step: String::from("directory check"),
                    diagnostic: result.diagnostic(),
                });
                false
            }
        }
    }

    async fn fetch_file(
        &self,
        target: &Target,
        name: &str,
        failures: &mut Vec<TargetFailure>,
    ) -> Option<String> {
        let path = remote_path(&self.settings.target_path, name);
        tracing::debug!(host = %target.name, file = name, "fetching");
        let command = RemoteCommand::new(fetch_script(&path), self.settings.file_timeout);

        match self.client.execute(&target.instance_id, &command).await {
            CommandResult::Success(content) if content.trim() == FILE_NOT_FOUND_MARKER => {
                tracing::warn!(host = %target.name, file = name, "file not found");
                None
            }
            CommandResult::Success(content) => {
                tracing::info!(host = %target.name, file = name, "extracted");
                Some(content)
            }
            other => {
                tracing::warn!(host = %target.name, file = name, "fetch failed");
                failures.push(TargetFailure::RemoteCommand {
                    target: target.name.clone(),
                    step: format!("fetch {name}"),
                    diagnostic: other.diagnostic(),
                });
                None
            }
        }
    }
}
