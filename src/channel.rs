//! Command channel abstraction: the remote-execution transport.

use std::future::Future;
use std::pin::Pin;

use crate::target::{CommandId, InstanceId};

/// Future returned by channel operations.
pub type ChannelFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Remote-side status of a submitted command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InvocationStatus {
    /// Accepted but not yet delivered to the agent.
    Pending,
    /// Running on the host.
    InProgress,
    /// Delivery delayed by the channel; will be retried remotely.
    Delayed,
    /// Cancellation requested but not complete.
    Cancelling,
    /// Finished with exit code zero.
    Success,
    /// Finished with a failure.
    Failed,
    /// Cancelled before completion.
    Cancelled,
    /// Exceeded the remote execution timeout.
    TimedOut,
    /// Any status this client does not know about; treated as non-terminal.
    Other(String),
}

impl InvocationStatus {
    /// Parses the status string reported by the channel.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Pending" => Self::Pending,
            "InProgress" => Self::InProgress,
            "Delayed" => Self::Delayed,
            "Cancelling" => Self::Cancelling,
            "Success" => Self::Success,
            "Failed" => Self::Failed,
            "Cancelled" => Self::Cancelled,
            "TimedOut" => Self::TimedOut,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns `true` once the command can make no further progress.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// Status label as reported by the channel.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Delayed => "Delayed",
            Self::Cancelling => "Cancelling",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::TimedOut => "TimedOut",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

/// Snapshot of a command invocation on one host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    /// Remote status.
    pub status: InvocationStatus,
    /// Captured standard output so far.
    pub stdout: String,
    /// Captured standard error so far.
    pub stderr: String,
}

/// Transport used to query agents and run scripts on remote targets.
pub trait CommandChannel: Send + Sync {
    /// Transport specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the agent's ping status, or `None` when the instance is not
    /// registered with the channel.
    fn ping_status<'a>(
        &'a self,
        instance: &'a InstanceId,
    ) -> ChannelFuture<'a, Option<String>, Self::Error>;

    /// Submits `script` for asynchronous execution and returns its id.
    fn send_command<'a>(
        &'a self,
        instance: &'a InstanceId,
        script: &'a str,
    ) -> ChannelFuture<'a, CommandId, Self::Error>;

    /// Fetches the current invocation state. `None` means the channel has not
    /// registered the invocation yet; callers should poll again.
    fn invocation<'a>(
        &'a self,
        instance: &'a InstanceId,
        command: &'a CommandId,
    ) -> ChannelFuture<'a, Option<Invocation>, Self::Error>;
}
