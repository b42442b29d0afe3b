//! Submit-and-poll protocol for running one script on one target.
//!
//! [`CommandClient::execute`] submits a script through a [`CommandChannel`],
//! waits an initial delay, then polls at a fixed interval until the channel
//! reports a terminal status or the local timeout elapses. Every path ends in
//! exactly one [`CommandResult`]; transport errors are folded into
//! [`CommandResult::Failed`] rather than propagated.

use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::channel::{CommandChannel, Invocation, InvocationStatus};
use crate::target::{CommandId, InstanceId};

/// Delay before the first poll; new invocations are rarely visible sooner.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(3);
/// Interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A script to run remotely and how long to wait for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommand {
    /// Script text handed to the remote shell.
    pub script: String,
    /// Local wait budget, independent of any remote timeout.
    pub timeout: Duration,
}

impl RemoteCommand {
    /// Creates a command.
    #[must_use]
    pub fn new(script: impl Into<String>, timeout: Duration) -> Self {
        Self {
            script: script.into(),
            timeout,
        }
    }
}

/// Terminal outcome of a submitted command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandResult {
    /// Finished successfully; carries captured standard output.
    Success(String),
    /// Failed remotely or in transport; carries a diagnostic.
    Failed(String),
    /// No terminal status was observed before the local timeout.
    TimedOut,
}

impl CommandResult {
    /// Returns the captured output for successful commands.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Success(output) => Some(output.as_str()),
            Self::Failed(_) | Self::TimedOut => None,
        }
    }

    /// Describes a non-successful result for diagnostics.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Success(_) => String::from("succeeded"),
            Self::Failed(message) => message.clone(),
            Self::TimedOut => String::from("timed out waiting for a terminal status"),
        }
    }
}

/// Runs [`RemoteCommand`]s over a channel.
#[derive(Clone, Debug)]
pub struct CommandClient<C> {
    channel: C,
    initial_delay: Duration,
    poll_interval: Duration,
}

impl<C: CommandChannel> CommandClient<C> {
    /// Creates a client with the default polling cadence.
    #[must_use]
    pub const fn new(channel: C) -> Self {
        Self {
            channel,
            initial_delay: DEFAULT_INITIAL_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the wait before the first poll.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Overrides the interval between polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Borrows the underlying channel.
    #[must_use]
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    /// Submits `command` to `instance` and waits for its terminal outcome.
    pub async fn execute(&self, instance: &InstanceId, command: &RemoteCommand) -> CommandResult {
        let command_id = match self.channel.send_command(instance, &command.script).await {
            Ok(id) => id,
            Err(err) => {
                tracing::error!(%instance, error = %err, "failed to submit command");
                return CommandResult::Failed(err.to_string());
            }
        };
        tracing::debug!(%instance, command = %command_id, "command submitted");

        sleep(self.initial_delay).await;
        self.poll(instance, &command_id, command.timeout).await
    }

    async fn poll(
        &self,
        instance: &InstanceId,
        command_id: &CommandId,
        timeout: Duration,
    ) -> CommandResult {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match self.channel.invocation(instance, command_id).await {
                Ok(Some(invocation)) if invocation.status.is_terminal() => {
                    return Self::conclude(instance, command_id, invocation);
                }
                Ok(Some(invocation)) => {
                    tracing::trace!(
                        %instance,
                        command = %command_id,
                        status = invocation.status.as_str(),
                        "command still running"
                    );
                }
                Ok(None) => {
                    tracing::trace!(%instance, command = %command_id, "invocation not visible yet");
                }
                Err(err) => {
                    tracing::error!(%instance, command = %command_id, error = %err, "polling failed");
                    return CommandResult::Failed(err.to_string());
                }
            }
            sleep(self.poll_interval).await;
        }

        tracing::warn!(
            %instance,
            command = %command_id,
            "timed out after {}s waiting for command",
            timeout.as_secs()
        );
        CommandResult::TimedOut
    }

    fn conclude(
        instance: &InstanceId,
        command_id: &CommandId,
        invocation: Invocation,
    ) -> CommandResult {
        if invocation.status == InvocationStatus::Success {
            return CommandResult::Success(invocation.stdout);
        }

        tracing::error!(
            %instance,
            command = %command_id,
            status = invocation.status.as_str(),
            "command failed"
        );
        let stderr = invocation.stderr.trim();
        if stderr.is_empty() {
            CommandResult::Failed(format!(
                "command finished with status {}",
                invocation.status.as_str()
            ))
        } else {
            tracing::error!(%instance, command = %command_id, "stderr: {stderr}");
            CommandResult::Failed(stderr.to_owned())
        }
    }
}
