//! AWS implementation of the command channel and target discovery.
//!
//! Rather than linking an SDK, the client shells out to the `aws` CLI through
//! a [`CommandRunner`] and parses its JSON output. This keeps credential and
//! profile resolution identical to what operators already use interactively.

use std::ffi::OsString;

use serde::de::DeserializeOwned;

use crate::runner::{CommandRunner, ProcessCommandRunner};

mod channel;
mod ec2;
mod error;
mod types;

pub use error::AwsError;

/// Default AWS CLI binary name.
pub const DEFAULT_AWS_BIN: &str = "aws";

/// SSM document used to run scripts on Windows hosts.
pub const POWERSHELL_DOCUMENT: &str = "AWS-RunPowerShellScript";

/// Connection settings for the `aws` executable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AwsCliSettings {
    /// Path to the `aws` binary.
    pub aws_bin: String,
    /// Named profile passed as `--profile`.
    pub profile: Option<String>,
    /// Region passed as `--region`; the profile's region applies otherwise.
    pub region: Option<String>,
}

impl Default for AwsCliSettings {
    fn default() -> Self {
        Self {
            aws_bin: String::from(DEFAULT_AWS_BIN),
            profile: None,
            region: None,
        }
    }
}

/// Account the configured credentials resolve to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallerIdentity {
    /// AWS account number.
    pub account: String,
    /// ARN of the calling principal.
    pub arn: String,
}

/// Client for the AWS CLI.
#[derive(Clone, Debug)]
pub struct AwsCli<R: CommandRunner> {
    settings: AwsCliSettings,
    runner: R,
}

impl AwsCli<ProcessCommandRunner> {
    /// Creates a client wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(settings: AwsCliSettings) -> Self {
        Self::new(settings, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> AwsCli<R> {
    /// Creates a client using the provided settings and runner.
    #[must_use]
    pub const fn new(settings: AwsCliSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    /// Returns the client settings.
    #[must_use]
    pub const fn settings(&self) -> &AwsCliSettings {
        &self.settings
    }

    /// Resolves the caller identity, proving credentials work before any
    /// instance is touched.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError`] when the CLI fails or its output cannot be parsed.
    pub async fn caller_identity(&self) -> Result<CallerIdentity, AwsError> {
        let identity: types::CallerIdentity = self
            .call_json(&["sts", "get-caller-identity"], Vec::new())
            .await?;
        Ok(CallerIdentity {
            account: identity.account,
            arn: identity.arn,
        })
    }

    /// Runs `aws <subcommand...> <args...>` and parses its JSON stdout.
    async fn call_json<T: DeserializeOwned>(
        &self,
        subcommand: &[&str],
        extra: Vec<OsString>,
    ) -> Result<T, AwsError> {
        let operation = subcommand.join(" ");
        let args = self.build_args(subcommand, extra);
        let output = self.runner.run(&self.settings.aws_bin, &args).await?;
        if !output.is_success() {
            return Err(AwsError::from_output(&operation, output));
        }

        serde_json::from_str(&output.stdout).map_err(|err| AwsError::Parse {
            operation,
            message: err.to_string(),
        })
    }

    fn build_args(&self, subcommand: &[&str], extra: Vec<OsString>) -> Vec<OsString> {
        let mut args: Vec<OsString> = subcommand.iter().map(OsString::from).collect();
        args.extend(extra);
        args.push(OsString::from("--output"));
        args.push(OsString::from("json"));
        if let Some(profile) = &self.settings.profile {
            args.push(OsString::from("--profile"));
            args.push(OsString::from(profile));
        }
        if let Some(region) = &self.settings.region {
            args.push(OsString::from("--region"));
            args.push(OsString::from(region));
        }
        args
    }
}
