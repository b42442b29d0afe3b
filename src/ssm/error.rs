//! Error types for the AWS CLI client.

use thiserror::Error;

use crate::runner::{CommandOutput, RunnerError};

const INVOCATION_DOES_NOT_EXIST: &str = "(InvocationDoesNotExist)";

/// Errors raised while talking to AWS through the `aws` executable.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AwsError {
    /// Raised when `aws` returns a non-zero exit status.
    #[error("aws {operation} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Operation that failed (for example `ssm send-command`).
        operation: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when SSM has not registered a command invocation yet.
    #[error("command invocation not registered yet")]
    InvocationDoesNotExist,
    /// Raised when JSON output from the CLI cannot be parsed.
    #[error("failed to parse aws {operation} output: {message}")]
    Parse {
        /// Operation whose output was being parsed.
        operation: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the `aws` executable cannot be started.
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

impl AwsError {
    /// Classifies a failed CLI invocation.
    pub(crate) fn from_output(operation: &str, output: CommandOutput) -> Self {
        if output.stderr.contains(INVOCATION_DOES_NOT_EXIST) {
            return Self::InvocationDoesNotExist;
        }

        Self::CommandFailure {
            operation: operation.to_owned(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        }
    }
}
